use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    ids::{UserId, WorkspaceId},
    visibility::WorkspaceVisibility,
    workspace_member::WorkspaceMemberRecord,
};

#[derive(Debug, Clone)]
pub struct CreateWorkspaceParams {
    pub id: WorkspaceId,
    pub owner_id: UserId,
    pub visibility: WorkspaceVisibility,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateVisibilityParams {
    pub public: Option<bool>,
    pub enable_url_preview: Option<bool>,
}

/// Workspace lifecycle and workspace-wide visibility flags.
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Inserts the workspace row and its active owner membership atomically.
    async fn create_workspace(&self, params: CreateWorkspaceParams)
    -> Result<WorkspaceMemberRecord>;

    async fn fetch_visibility(&self, workspace_id: &str) -> Result<Option<WorkspaceVisibility>>;

    async fn update_visibility(
        &self,
        workspace_id: &str,
        params: UpdateVisibilityParams,
    ) -> Result<bool>;

    /// Removes the workspace together with every membership, document role
    /// and publication row scoped to it, owner rows included.
    async fn delete_workspace(&self, workspace_id: &str) -> Result<bool>;

    /// Removes every workspace membership and document role held by the
    /// user, owner rows included. Returns the number of deleted rows.
    async fn purge_user(&self, user_id: &str) -> Result<u64>;
}

pub type WorkspaceRepositoryRef = Arc<dyn WorkspaceRepository>;
