//! SQLite pool for the permission store.
//!
//! Membership writes rely on short single-statement transactions, so every
//! connection waits on a locked database instead of failing right away.

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::debug;

use crate::config::PermissionConfig;

pub type SqlitePool = Pool<Sqlite>;

/// Connection parameters resolved from [`PermissionConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteSettings {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl SqliteSettings {
    /// Relative database paths are anchored at the current directory.
    pub fn from_config(config: &PermissionConfig) -> Result<Self> {
        let path = PathBuf::from(&config.database_path);
        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .context("failed to obtain current directory")?
                .join(path)
        };

        Ok(Self {
            path,
            max_connections: config.database_max_connections.max(1),
            busy_timeout: Duration::from_millis(config.database_busy_timeout_ms),
        })
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
    }
}

/// Creates the database directory if needed, connects, and brings the schema
/// up to date.
pub async fn open(settings: &SqliteSettings) -> Result<SqlitePool> {
    if let Some(parent) = settings.path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create database directory: {}", parent.display())
        })?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(settings.connect_options())
        .await
        .with_context(|| format!("failed to connect to database: {}", settings.path.display()))?;

    sqlx::migrate!("./migrations/sqlite")
        .run(&pool)
        .await
        .context("failed to run permission migrations")?;

    debug!(
        path = %settings.path.display(),
        max_connections = settings.max_connections,
        busy_timeout_ms = settings.busy_timeout.as_millis() as u64,
        "permission database opened"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::*;

    #[test]
    fn settings_follow_config() {
        let config = PermissionConfig {
            database_path: "/var/lib/perm.db".to_owned(),
            database_max_connections: 0,
            database_busy_timeout_ms: 250,
            ..PermissionConfig::default()
        };

        let settings = SqliteSettings::from_config(&config).expect("settings");
        assert_eq!(settings.path, PathBuf::from("/var/lib/perm.db"));
        assert_eq!(settings.max_connections, 1);
        assert_eq!(settings.busy_timeout, Duration::from_millis(250));

        let relative = PermissionConfig {
            database_path: "data/perm.db".to_owned(),
            ..PermissionConfig::default()
        };
        let settings = SqliteSettings::from_config(&relative).expect("settings");
        assert!(settings.path.is_absolute());
        assert!(settings.path.ends_with("data/perm.db"));
    }

    #[tokio::test]
    async fn open_creates_directory_and_schema() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let settings = SqliteSettings {
            path: dir.path().join("nested").join("perm.db"),
            max_connections: 2,
            busy_timeout: Duration::from_millis(1500),
        };

        let pool = open(&settings).await.expect("open");
        assert!(settings.path.exists());

        let tables: Vec<String> = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .expect("list tables")
        .iter()
        .map(|row| row.get("name"))
        .collect();
        assert_eq!(
            tables,
            ["doc_user_roles", "doc_visibility", "workspace_members", "workspaces"]
        );

        let mut conn = pool.acquire().await.expect("acquire");
        let journal: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&mut *conn)
            .await
            .expect("journal mode");
        assert_eq!(journal, "wal");
        let busy: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&mut *conn)
            .await
            .expect("busy timeout");
        assert_eq!(busy, 1500);

        // Reopening an up-to-date database is a no-op migration.
        drop(conn);
        pool.close().await;
        open(&settings).await.expect("reopen");
    }
}
