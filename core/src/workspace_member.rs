use serde::{Deserialize, Serialize};

use crate::{
    ids::{MembershipId, UserId, WorkspaceId},
    member_status::MembershipStatus,
    roles::WorkspaceRole,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMemberRecord {
    pub id: MembershipId,
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: WorkspaceRole,
    pub status: MembershipStatus,
    /// Legacy acceptance flag kept alongside `status` for stored data.
    /// Read it through [`WorkspaceMemberRecord::is_active`].
    pub accepted: bool,
    pub created_at: i64,
}

impl WorkspaceMemberRecord {
    pub fn is_active(&self) -> bool {
        is_active(self.accepted, self.status)
    }

    pub fn is_owner(&self) -> bool {
        self.role == WorkspaceRole::Owner
    }
}

pub const fn is_active(accepted: bool, status: MembershipStatus) -> bool {
    accepted && matches!(status, MembershipStatus::Accepted)
}

/// Fields of a membership row that is about to be inserted.
#[derive(Debug, Clone)]
pub struct NewWorkspaceMember {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: WorkspaceRole,
    pub status: MembershipStatus,
    pub accepted: bool,
}
