use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{doc_roles::DocumentRoleRecord, ids::UserId, roles::DocRole};

#[async_trait]
pub trait DocRoleRepository: Send + Sync {
    async fn list_for_doc(
        &self,
        workspace_id: &str,
        doc_id: &str,
    ) -> Result<Vec<DocumentRoleRecord>>;

    async fn find_for_user(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
    ) -> Result<Option<DocumentRoleRecord>>;

    async fn find_owner(&self, workspace_id: &str, doc_id: &str)
    -> Result<Option<DocumentRoleRecord>>;

    /// Upserts the user's role. When `role` is owner, any other owner of the
    /// document is demoted to manager in the same transaction and the demoted
    /// users are returned. Returns `None` when the user already owns the
    /// document and `role` is lower; owner rows are never lowered here.
    async fn grant_role(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
        role: DocRole,
        created_at: i64,
    ) -> Result<Option<Vec<UserId>>>;

    /// Upserts the same role for several users in one transaction. No owner
    /// demotion happens here, and existing owner rows are skipped and left
    /// out of the result.
    async fn upsert_roles(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_ids: &[UserId],
        role: DocRole,
        created_at: i64,
    ) -> Result<Vec<DocumentRoleRecord>>;

    /// Plain role update of an existing non-owner row.
    async fn update_role(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
        role: DocRole,
    ) -> Result<bool>;

    /// Deletes the users' rows, never touching owner rows.
    async fn remove_non_owner_roles(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_ids: &[UserId],
    ) -> Result<u64>;

    /// Inserts an owner row for the user if the document has no owner yet and
    /// the user has no row for it. Conflicts are ignored.
    async fn insert_owner_if_absent(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
        created_at: i64,
    ) -> Result<bool>;
}

pub type DocRoleRepositoryRef = Arc<dyn DocRoleRepository>;
