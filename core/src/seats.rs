use tracing::{debug, info};

use crate::{
    db::{Database, RepositoryRegistry, workspace_member_repo::WorkspaceMemberRepositoryRef},
    error::PermissionResult,
    locks::KeyedLocks,
    member_status::MembershipStatus,
    workspace_member::WorkspaceMemberRecord,
};

/// Promotes waitlisted members as seats free up.
#[derive(Clone)]
pub struct SeatReconciler {
    member_repo: WorkspaceMemberRepositoryRef,
    locks: KeyedLocks,
}

impl SeatReconciler {
    pub fn new(database: &Database, locks: KeyedLocks) -> Self {
        Self::from_repositories(database.repositories(), locks)
    }

    pub fn from_repositories(repositories: &RepositoryRegistry, locks: KeyedLocks) -> Self {
        Self {
            member_repo: repositories.workspace_member_repo(),
            locks,
        }
    }

    /// Fills free seats with the oldest waitlisted members, in creation order.
    /// `NeedMoreSeat` becomes `Pending` and `NeedMoreSeatAndReview` becomes
    /// `UnderReview`; `accepted` is left alone. Returns the promoted rows.
    pub async fn refresh_seat_status(
        &self,
        workspace_id: &str,
        seat_limit: i64,
    ) -> PermissionResult<Vec<WorkspaceMemberRecord>> {
        let _guard = self.locks.lock_workspace(workspace_id).await;

        let used = self
            .member_repo
            .count_with_status(workspace_id, MembershipStatus::Accepted)
            .await?;
        if seat_limit.saturating_sub(used) <= 0 {
            debug!(workspace_id, seat_limit, used, "no free seats");
            return Ok(Vec::new());
        }

        let promoted = self
            .member_repo
            .promote_waitlisted(workspace_id, seat_limit)
            .await?;

        if !promoted.is_empty() {
            info!(
                workspace_id,
                seat_limit,
                promoted = promoted.len(),
                "waitlisted members promoted"
            );
        }
        Ok(promoted)
    }

    /// Status a new invitation should start in given the current seat usage.
    pub async fn invite_status_for_seats(
        &self,
        workspace_id: &str,
        seat_limit: i64,
        needs_review: bool,
    ) -> PermissionResult<MembershipStatus> {
        let used = self
            .member_repo
            .count_with_status(workspace_id, MembershipStatus::Accepted)
            .await?;
        Ok(MembershipStatus::for_invitation(
            used < seat_limit,
            needs_review,
        ))
    }
}
