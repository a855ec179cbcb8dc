use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::{Row, sqlite::SqliteRow};

use crate::{
    db::doc_visibility_repo::DocVisibilityRepository,
    ids::{DocId, WorkspaceId},
    visibility::{DocumentVisibility, PublicDocMode},
};

use super::connection::SqlitePool;

pub struct SqliteDocVisibilityRepository {
    pool: SqlitePool,
}

impl SqliteDocVisibilityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<DocumentVisibility> {
        let mode: String = row.try_get("mode")?;

        Ok(DocumentVisibility {
            workspace_id: WorkspaceId::from(row.try_get::<String, _>("workspace_id")?),
            doc_id: DocId::from(row.try_get::<String, _>("doc_id")?),
            public: row.try_get::<i64, _>("public")? != 0,
            mode: PublicDocMode::parse(&mode)
                .ok_or_else(|| anyhow!("unknown public doc mode {mode:?}"))?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl DocVisibilityRepository for SqliteDocVisibilityRepository {
    async fn fetch(&self, workspace_id: &str, doc_id: &str) -> Result<Option<DocumentVisibility>> {
        let row = sqlx::query(
            "SELECT workspace_id, doc_id, public, mode, updated_at
             FROM doc_visibility
             WHERE workspace_id = ? AND doc_id = ?",
        )
        .bind(workspace_id)
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn upsert(
        &self,
        workspace_id: &str,
        doc_id: &str,
        public: bool,
        mode: Option<PublicDocMode>,
        updated_at: i64,
    ) -> Result<DocumentVisibility> {
        let row = sqlx::query(
            "INSERT INTO doc_visibility (workspace_id, doc_id, public, mode, updated_at)
             VALUES (?, ?, ?, COALESCE(?, ?), ?)
             ON CONFLICT(workspace_id, doc_id) DO UPDATE SET
                 public = excluded.public,
                 mode = COALESCE(?, doc_visibility.mode),
                 updated_at = excluded.updated_at
             RETURNING workspace_id, doc_id, public, mode, updated_at",
        )
        .bind(workspace_id)
        .bind(doc_id)
        .bind(public)
        .bind(mode.map(PublicDocMode::as_str))
        .bind(PublicDocMode::default().as_str())
        .bind(updated_at)
        .bind(mode.map(PublicDocMode::as_str))
        .fetch_one(&self.pool)
        .await?;

        Self::map_row(&row)
    }

    async fn count_public(&self, workspace_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM doc_visibility WHERE workspace_id = ? AND public = 1",
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn list_public(&self, workspace_id: &str) -> Result<Vec<DocumentVisibility>> {
        let rows = sqlx::query(
            "SELECT workspace_id, doc_id, public, mode, updated_at
             FROM doc_visibility
             WHERE workspace_id = ? AND public = 1
             ORDER BY doc_id ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}
