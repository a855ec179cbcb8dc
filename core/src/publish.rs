use tracing::info;

use crate::{
    db::{
        Database, RepositoryRegistry,
        doc_visibility_repo::DocVisibilityRepositoryRef,
        workspace_repo::{UpdateVisibilityParams, WorkspaceRepositoryRef},
    },
    error::PermissionResult,
    grant::now_millis,
    visibility::{DocumentVisibility, PublicDocMode},
};

/// Document publication and workspace-wide visibility flags.
#[derive(Clone)]
pub struct PublicationManager {
    workspace_repo: WorkspaceRepositoryRef,
    doc_visibility_repo: DocVisibilityRepositoryRef,
}

impl PublicationManager {
    pub fn new(database: &Database) -> Self {
        Self::from_repositories(database.repositories())
    }

    pub fn from_repositories(repositories: &RepositoryRegistry) -> Self {
        Self {
            workspace_repo: repositories.workspace_repo(),
            doc_visibility_repo: repositories.doc_visibility_repo(),
        }
    }

    pub async fn publish_page(
        &self,
        workspace_id: &str,
        doc_id: &str,
        mode: PublicDocMode,
    ) -> PermissionResult<DocumentVisibility> {
        let visibility = self
            .doc_visibility_repo
            .upsert(workspace_id, doc_id, true, Some(mode), now_millis())
            .await?;

        info!(workspace_id, doc_id, mode = %mode, "doc published");
        Ok(visibility)
    }

    /// Unpublishes the document, keeping the last mode. Revoking a document
    /// that was never published leaves an unpublished row behind.
    pub async fn revoke_public_page(
        &self,
        workspace_id: &str,
        doc_id: &str,
    ) -> PermissionResult<DocumentVisibility> {
        let visibility = self
            .doc_visibility_repo
            .upsert(workspace_id, doc_id, false, None, now_millis())
            .await?;

        info!(workspace_id, doc_id, "doc unpublished");
        Ok(visibility)
    }

    pub async fn public_pages(&self, workspace_id: &str) -> PermissionResult<Vec<DocumentVisibility>> {
        Ok(self.doc_visibility_repo.list_public(workspace_id).await?)
    }

    /// `None` leaves the flag as stored. Returns false when the workspace is
    /// unknown.
    pub async fn set_workspace_visibility(
        &self,
        workspace_id: &str,
        public: Option<bool>,
        enable_url_preview: Option<bool>,
    ) -> PermissionResult<bool> {
        let updated = self
            .workspace_repo
            .update_visibility(
                workspace_id,
                UpdateVisibilityParams {
                    public,
                    enable_url_preview,
                },
            )
            .await?;

        info!(workspace_id, ?public, ?enable_url_preview, updated, "workspace visibility");
        Ok(updated)
    }
}
