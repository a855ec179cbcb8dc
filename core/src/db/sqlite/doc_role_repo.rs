use anyhow::Result;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::{
    db::doc_role_repo::DocRoleRepository, doc_roles::DocumentRoleRecord, ids::UserId,
    roles::DocRole,
};

use super::{DOC_ROLE_COLUMNS, connection::SqlitePool, map_doc_role_row};

pub struct SqliteDocRoleRepository {
    pool: SqlitePool,
}

impl SqliteDocRoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert that never lowers an owner row: the conflict update only runs
    /// when the stored row is not an owner or the new role is owner. A skipped
    /// update returns no row.
    fn upsert_sql() -> String {
        let owner = DocRole::Owner.as_i64();
        format!(
            "INSERT INTO doc_user_roles (workspace_id, doc_id, user_id, role, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(workspace_id, doc_id, user_id)
             DO UPDATE SET role = excluded.role
             WHERE doc_user_roles.role != {owner} OR excluded.role = {owner}
             RETURNING {DOC_ROLE_COLUMNS}"
        )
    }
}

#[async_trait]
impl DocRoleRepository for SqliteDocRoleRepository {
    async fn list_for_doc(
        &self,
        workspace_id: &str,
        doc_id: &str,
    ) -> Result<Vec<DocumentRoleRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOC_ROLE_COLUMNS}
             FROM doc_user_roles
             WHERE workspace_id = ? AND doc_id = ?
             ORDER BY created_at ASC, user_id ASC"
        ))
        .bind(workspace_id)
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_doc_role_row).collect()
    }

    async fn find_for_user(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
    ) -> Result<Option<DocumentRoleRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {DOC_ROLE_COLUMNS}
             FROM doc_user_roles
             WHERE workspace_id = ? AND doc_id = ? AND user_id = ?"
        ))
        .bind(workspace_id)
        .bind(doc_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_doc_role_row).transpose()
    }

    async fn find_owner(
        &self,
        workspace_id: &str,
        doc_id: &str,
    ) -> Result<Option<DocumentRoleRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {DOC_ROLE_COLUMNS}
             FROM doc_user_roles
             WHERE workspace_id = ? AND doc_id = ? AND role = ?
             ORDER BY created_at ASC
             LIMIT 1"
        ))
        .bind(workspace_id)
        .bind(doc_id)
        .bind(DocRole::Owner.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_doc_role_row).transpose()
    }

    async fn grant_role(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
        role: DocRole,
        created_at: i64,
    ) -> Result<Option<Vec<UserId>>> {
        let mut tx = self.pool.begin().await?;

        let upserted = sqlx::query(&Self::upsert_sql())
            .bind(workspace_id)
            .bind(doc_id)
            .bind(user_id)
            .bind(role.as_i64())
            .bind(created_at)
            .fetch_optional(&mut *tx)
            .await?;

        if upserted.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let mut demoted = Vec::new();
        if role == DocRole::Owner {
            let rows = sqlx::query(
                "UPDATE doc_user_roles
                 SET role = ?
                 WHERE workspace_id = ? AND doc_id = ? AND user_id != ? AND role = ?
                 RETURNING user_id",
            )
            .bind(DocRole::demoted_owner().as_i64())
            .bind(workspace_id)
            .bind(doc_id)
            .bind(user_id)
            .bind(DocRole::Owner.as_i64())
            .fetch_all(&mut *tx)
            .await?;

            for row in rows {
                demoted.push(UserId::from(row.try_get::<String, _>("user_id")?));
            }
        }

        tx.commit().await?;
        Ok(Some(demoted))
    }

    async fn upsert_roles(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_ids: &[UserId],
        role: DocRole,
        created_at: i64,
    ) -> Result<Vec<DocumentRoleRecord>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = Self::upsert_sql();
        let mut tx = self.pool.begin().await?;
        let mut records = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let row = sqlx::query(&sql)
                .bind(workspace_id)
                .bind(doc_id)
                .bind(user_id)
                .bind(role.as_i64())
                .bind(created_at)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(row) = row {
                records.push(map_doc_role_row(&row)?);
            }
        }
        tx.commit().await?;

        Ok(records)
    }

    async fn update_role(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
        role: DocRole,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE doc_user_roles
             SET role = ?
             WHERE workspace_id = ? AND doc_id = ? AND user_id = ? AND role != ?",
        )
        .bind(role.as_i64())
        .bind(workspace_id)
        .bind(doc_id)
        .bind(user_id)
        .bind(DocRole::Owner.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_non_owner_roles(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_ids: &[UserId],
    ) -> Result<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM doc_user_roles WHERE workspace_id = ");
        builder.push_bind(workspace_id);
        builder.push(" AND doc_id = ");
        builder.push_bind(doc_id);
        builder.push(" AND role != ");
        builder.push_bind(DocRole::Owner.as_i64());
        builder.push(" AND user_id IN (");
        {
            let mut separated = builder.separated(", ");
            for user_id in user_ids {
                separated.push_bind(user_id.as_str());
            }
        }
        builder.push(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn insert_owner_if_absent(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
        created_at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO doc_user_roles (workspace_id, doc_id, user_id, role, created_at)
             SELECT ?, ?, ?, ?, ?
             WHERE NOT EXISTS (
                 SELECT 1
                 FROM doc_user_roles
                 WHERE workspace_id = ? AND doc_id = ? AND role = ?
             )
             ON CONFLICT(workspace_id, doc_id, user_id) DO NOTHING",
        )
        .bind(workspace_id)
        .bind(doc_id)
        .bind(user_id)
        .bind(DocRole::Owner.as_i64())
        .bind(created_at)
        .bind(workspace_id)
        .bind(doc_id)
        .bind(DocRole::Owner.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
