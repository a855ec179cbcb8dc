use anyhow::Result;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::{
    db::workspace_repo::{CreateWorkspaceParams, UpdateVisibilityParams, WorkspaceRepository},
    ids::MembershipId,
    member_status::MembershipStatus,
    roles::WorkspaceRole,
    visibility::WorkspaceVisibility,
    workspace_member::WorkspaceMemberRecord,
};

use super::connection::SqlitePool;

pub struct SqliteWorkspaceRepository {
    pool: SqlitePool,
}

impl SqliteWorkspaceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceRepository for SqliteWorkspaceRepository {
    async fn create_workspace(
        &self,
        params: CreateWorkspaceParams,
    ) -> Result<WorkspaceMemberRecord> {
        let CreateWorkspaceParams {
            id,
            owner_id,
            visibility,
            created_at,
        } = params;
        let membership_id = MembershipId::generate();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO workspaces (id, public, enable_url_preview, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(visibility.public)
        .bind(visibility.enable_url_preview)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO workspace_members (
                 id,
                 workspace_id,
                 user_id,
                 role,
                 status,
                 accepted,
                 created_at
             ) VALUES (?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&membership_id)
        .bind(&id)
        .bind(&owner_id)
        .bind(WorkspaceRole::Owner.as_i64())
        .bind(MembershipStatus::Accepted.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(WorkspaceMemberRecord {
            id: membership_id,
            workspace_id: id,
            user_id: owner_id,
            role: WorkspaceRole::Owner,
            status: MembershipStatus::Accepted,
            accepted: true,
            created_at,
        })
    }

    async fn fetch_visibility(&self, workspace_id: &str) -> Result<Option<WorkspaceVisibility>> {
        let row = sqlx::query("SELECT public, enable_url_preview FROM workspaces WHERE id = ?")
            .bind(workspace_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| WorkspaceVisibility {
            public: row.get::<i64, _>("public") != 0,
            enable_url_preview: row.get::<i64, _>("enable_url_preview") != 0,
        }))
    }

    async fn update_visibility(
        &self,
        workspace_id: &str,
        params: UpdateVisibilityParams,
    ) -> Result<bool> {
        let UpdateVisibilityParams {
            public,
            enable_url_preview,
        } = params;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE workspaces SET ");
        let mut has_updates = false;

        if let Some(public) = public {
            builder.push("public = ");
            builder.push_bind(public);
            has_updates = true;
        }
        if let Some(enable_url_preview) = enable_url_preview {
            if has_updates {
                builder.push(", ");
            }
            builder.push("enable_url_preview = ");
            builder.push_bind(enable_url_preview);
            has_updates = true;
        }

        if !has_updates {
            return Ok(false);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(workspace_id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_workspace(&self, workspace_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM workspaces WHERE id = ?")
            .bind(workspace_id)
            .execute(&mut *tx)
            .await?;

        for statement in [
            "DELETE FROM workspace_members WHERE workspace_id = ?",
            "DELETE FROM doc_user_roles WHERE workspace_id = ?",
            "DELETE FROM doc_visibility WHERE workspace_id = ?",
        ] {
            sqlx::query(statement)
                .bind(workspace_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_user(&self, user_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let members = sqlx::query("DELETE FROM workspace_members WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let doc_roles = sqlx::query("DELETE FROM doc_user_roles WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(members.rows_affected() + doc_roles.rows_affected())
    }
}
