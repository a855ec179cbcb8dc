//! Read-only permission decisions.
//!
//! Document checks cascade in a fixed order: public visibility, then an
//! explicit document grant, then the caller's workspace role. Each stage can
//! grant access on its own and short-circuits the later, more expensive ones.

use tracing::warn;

use crate::{
    db::{
        Database, RepositoryRegistry, doc_role_repo::DocRoleRepositoryRef,
        doc_visibility_repo::DocVisibilityRepositoryRef,
        workspace_member_repo::WorkspaceMemberRepositoryRef,
        workspace_repo::WorkspaceRepositoryRef,
    },
    doc_roles::DocumentRoleRecord,
    error::{PermissionError, PermissionResult},
    ids::{DocId, WorkspaceId},
    roles::{DocAction, DocRole, WorkspaceRole, required_doc_role, required_workspace_role},
    workspace_member::WorkspaceMemberRecord,
};

#[derive(Clone)]
pub struct AccessEvaluator {
    workspace_repo: WorkspaceRepositoryRef,
    member_repo: WorkspaceMemberRepositoryRef,
    doc_role_repo: DocRoleRepositoryRef,
    doc_visibility_repo: DocVisibilityRepositoryRef,
}

impl AccessEvaluator {
    pub fn new(database: &Database) -> Self {
        Self::from_repositories(database.repositories())
    }

    pub fn from_repositories(repositories: &RepositoryRegistry) -> Self {
        Self {
            workspace_repo: repositories.workspace_repo(),
            member_repo: repositories.workspace_member_repo(),
            doc_role_repo: repositories.doc_role_repo(),
            doc_visibility_repo: repositories.doc_visibility_repo(),
        }
    }

    /// True iff the user holds an active membership with at least `min_role`.
    pub async fn is_workspace_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        min_role: WorkspaceRole,
    ) -> PermissionResult<bool> {
        let count = self
            .member_repo
            .count_active_at_least(workspace_id, user_id, min_role)
            .await?;
        Ok(count > 0)
    }

    /// Role of the user's active membership, if any.
    pub async fn workspace_role(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> PermissionResult<Option<WorkspaceRole>> {
        let member = self
            .member_repo
            .find_active_member(workspace_id, user_id)
            .await?;
        Ok(member.map(|member| member.role))
    }

    /// A public workspace admits everyone, anonymous callers included, at
    /// the collaborator tier. Higher tiers always need an active membership.
    pub async fn try_check_workspace(
        &self,
        workspace_id: &str,
        user_id: Option<&str>,
        min_role: WorkspaceRole,
    ) -> PermissionResult<bool> {
        if min_role == WorkspaceRole::Collaborator && self.is_public_workspace(workspace_id).await? {
            return Ok(true);
        }

        match user_id {
            Some(user_id) => self.is_workspace_member(workspace_id, user_id, min_role).await,
            None => Ok(false),
        }
    }

    pub async fn check_workspace(
        &self,
        workspace_id: &str,
        user_id: Option<&str>,
        min_role: WorkspaceRole,
    ) -> PermissionResult<()> {
        if self
            .try_check_workspace(workspace_id, user_id, min_role)
            .await?
        {
            return Ok(());
        }

        warn!(
            workspace_id,
            user_id = user_id.unwrap_or("-"),
            required_role = %min_role,
            "workspace access denied"
        );
        Err(PermissionError::space_access_denied(&WorkspaceId::from(
            workspace_id,
        )))
    }

    /// Exact-tier check: the active membership must hold `role` itself.
    pub async fn try_check_workspace_is(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> PermissionResult<bool> {
        Ok(self.workspace_role(workspace_id, user_id).await? == Some(role))
    }

    pub async fn check_workspace_is(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> PermissionResult<()> {
        if self
            .try_check_workspace_is(workspace_id, user_id, role)
            .await?
        {
            return Ok(());
        }

        warn!(
            workspace_id,
            user_id,
            required_role = %role,
            "workspace role mismatch"
        );
        Err(PermissionError::space_access_denied(&WorkspaceId::from(
            workspace_id,
        )))
    }

    pub async fn is_workspace_owner(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> PermissionResult<bool> {
        self.try_check_workspace_is(workspace_id, user_id, WorkspaceRole::Owner)
            .await
    }

    pub async fn workspace_owner(&self, workspace_id: &str) -> PermissionResult<WorkspaceMemberRecord> {
        self.member_repo
            .find_active_owner(workspace_id)
            .await?
            .ok_or_else(|| PermissionError::SpaceOwnerNotFound {
                workspace_id: WorkspaceId::from(workspace_id),
            })
    }

    pub async fn is_public_workspace(&self, workspace_id: &str) -> PermissionResult<bool> {
        let visibility = self.workspace_repo.fetch_visibility(workspace_id).await?;
        Ok(visibility.is_some_and(|visibility| visibility.public))
    }

    pub async fn allow_url_preview(&self, workspace_id: &str) -> PermissionResult<bool> {
        let visibility = self.workspace_repo.fetch_visibility(workspace_id).await?;
        Ok(visibility.is_some_and(|visibility| visibility.enable_url_preview))
    }

    pub async fn is_public_page(&self, workspace_id: &str, doc_id: &str) -> PermissionResult<bool> {
        let visibility = self.doc_visibility_repo.fetch(workspace_id, doc_id).await?;
        Ok(visibility.is_some_and(|visibility| visibility.public))
    }

    /// `target_id` is either the workspace itself or one of its documents.
    /// The workspace root is reachable when the workspace is public or has
    /// at least one published document.
    pub async fn is_public_accessible(
        &self,
        workspace_id: &str,
        target_id: &str,
        user_id: Option<&str>,
    ) -> PermissionResult<bool> {
        if workspace_id == target_id {
            if self.is_public_workspace(workspace_id).await? {
                return Ok(true);
            }
            let published = self.doc_visibility_repo.count_public(workspace_id).await?;
            return Ok(published > 0);
        }

        self.try_check_page(workspace_id, target_id, DocAction::Read, user_id)
            .await
    }

    pub async fn doc_role(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
    ) -> PermissionResult<Option<DocRole>> {
        let record = self
            .doc_role_repo
            .find_for_user(workspace_id, doc_id, user_id)
            .await?;
        Ok(record.map(|record| record.role))
    }

    pub async fn doc_owner(
        &self,
        workspace_id: &str,
        doc_id: &str,
    ) -> PermissionResult<Option<DocumentRoleRecord>> {
        Ok(self.doc_role_repo.find_owner(workspace_id, doc_id).await?)
    }

    pub async fn try_check_page(
        &self,
        workspace_id: &str,
        doc_id: &str,
        action: DocAction,
        user_id: Option<&str>,
    ) -> PermissionResult<bool> {
        if action.is_read() && self.is_public_page(workspace_id, doc_id).await? {
            return Ok(true);
        }

        if let Some(user_id) = user_id {
            if let Some(role) = self.doc_role(workspace_id, doc_id, user_id).await? {
                if role.at_least(required_doc_role(action)) {
                    return Ok(true);
                }
            }
        }

        self.try_check_workspace(workspace_id, user_id, required_workspace_role(action))
            .await
    }

    pub async fn check_page_permission(
        &self,
        workspace_id: &str,
        doc_id: &str,
        action: DocAction,
        user_id: Option<&str>,
    ) -> PermissionResult<()> {
        if self
            .try_check_page(workspace_id, doc_id, action, user_id)
            .await?
        {
            return Ok(());
        }

        warn!(
            workspace_id,
            doc_id,
            user_id = user_id.unwrap_or("-"),
            action = %action,
            "doc access denied"
        );
        Err(PermissionError::doc_access_denied(
            &WorkspaceId::from(workspace_id),
            &DocId::from(doc_id),
        ))
    }
}
