use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    ids::UserId,
    member_status::MembershipStatus,
    roles::WorkspaceRole,
    workspace_member::{NewWorkspaceMember, WorkspaceMemberRecord},
};

#[async_trait]
pub trait WorkspaceMemberRepository: Send + Sync {
    async fn get_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMemberRecord>>;

    async fn find_active_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMemberRecord>>;

    /// Counts active rows for the user whose role is at least `min_role`.
    async fn count_active_at_least(
        &self,
        workspace_id: &str,
        user_id: &str,
        min_role: WorkspaceRole,
    ) -> Result<i64>;

    async fn find_active_owner(&self, workspace_id: &str) -> Result<Option<WorkspaceMemberRecord>>;

    /// Inserts a new membership row. Returns `None` when a row for the same
    /// (workspace, user) already exists.
    async fn insert_member(
        &self,
        member: NewWorkspaceMember,
        created_at: i64,
    ) -> Result<Option<WorkspaceMemberRecord>>;

    /// Changes the role of an active membership. When `role` is owner, every
    /// other active owner of the workspace is demoted to admin in the same
    /// transaction. Returns `None` if no active row matched, otherwise the
    /// users that were demoted.
    async fn set_active_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<Option<Vec<UserId>>>;

    /// Compare-and-set on the membership status. Moving to `Accepted` also
    /// sets `accepted`, and an owner row that becomes active demotes any
    /// other active owner in the same transaction.
    async fn transition_status(
        &self,
        workspace_id: &str,
        user_id: &str,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> Result<bool>;

    /// Unconditional status write with the same accepted/owner handling as
    /// [`Self::transition_status`].
    async fn set_status(
        &self,
        workspace_id: &str,
        user_id: &str,
        status: MembershipStatus,
    ) -> Result<bool>;

    /// Flips `accepted` and sets `status`, only while the row is still an
    /// unaccepted pending invitation. Accepting an owner invitation demotes
    /// the current active owner.
    async fn accept_invitation(
        &self,
        membership_id: &str,
        workspace_id: &str,
        status: MembershipStatus,
    ) -> Result<bool>;

    /// Deletes the membership unless it holds the owner role. Returns the
    /// deleted row as it was before removal.
    async fn delete_non_owner(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMemberRecord>>;

    async fn count_members(&self, workspace_id: &str) -> Result<i64>;

    async fn count_with_status(&self, workspace_id: &str, status: MembershipStatus)
    -> Result<i64>;

    /// Moves the oldest waitlisted members one step forward, taking at most
    /// as many as `seat_limit` leaves free after counting accepted members.
    /// Counting, selection and update happen in one transaction.
    async fn promote_waitlisted(
        &self,
        workspace_id: &str,
        seat_limit: i64,
    ) -> Result<Vec<WorkspaceMemberRecord>>;

    async fn list_members(
        &self,
        workspace_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<WorkspaceMemberRecord>>;

    async fn list_active_for_user(&self, user_id: &str) -> Result<Vec<WorkspaceMemberRecord>>;
}

pub type WorkspaceMemberRepositoryRef = Arc<dyn WorkspaceMemberRepository>;
