//! Membership mutations for workspaces and documents.
//!
//! Every owner change runs as one repository transaction (demote the old
//! owner, promote the new one) while holding the workspace or document key
//! lock, so concurrent transfers on the same key are serialised.

use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, info};

use crate::{
    db::{
        Database, RepositoryRegistry,
        doc_role_repo::DocRoleRepositoryRef,
        workspace_member_repo::WorkspaceMemberRepositoryRef,
        workspace_repo::{CreateWorkspaceParams, WorkspaceRepositoryRef},
    },
    doc_roles::DocumentRoleRecord,
    error::{PermissionError, PermissionResult},
    ids::{MembershipId, UserId, WorkspaceId},
    locks::KeyedLocks,
    member_status::MembershipStatus,
    notifier::MembershipNotifierRef,
    roles::{DocRole, WorkspaceRole},
    visibility::WorkspaceVisibility,
    workspace_member::{NewWorkspaceMember, WorkspaceMemberRecord},
};

#[derive(Clone)]
pub struct GrantManager {
    workspace_repo: WorkspaceRepositoryRef,
    member_repo: WorkspaceMemberRepositoryRef,
    doc_role_repo: DocRoleRepositoryRef,
    notifier: MembershipNotifierRef,
    locks: KeyedLocks,
}

impl GrantManager {
    pub fn new(database: &Database, notifier: MembershipNotifierRef, locks: KeyedLocks) -> Self {
        Self::from_repositories(database.repositories(), notifier, locks)
    }

    pub fn from_repositories(
        repositories: &RepositoryRegistry,
        notifier: MembershipNotifierRef,
        locks: KeyedLocks,
    ) -> Self {
        Self {
            workspace_repo: repositories.workspace_repo(),
            member_repo: repositories.workspace_member_repo(),
            doc_role_repo: repositories.doc_role_repo(),
            notifier,
            locks,
        }
    }

    /// Creates the workspace together with its owner's active membership.
    pub async fn create_workspace(
        &self,
        workspace_id: &str,
        owner_id: &str,
        visibility: WorkspaceVisibility,
    ) -> PermissionResult<WorkspaceMemberRecord> {
        let owner = self
            .workspace_repo
            .create_workspace(CreateWorkspaceParams {
                id: WorkspaceId::from(workspace_id),
                owner_id: UserId::from(owner_id),
                visibility,
                created_at: now_millis(),
            })
            .await?;

        info!(workspace_id, owner_id, "workspace created");
        Ok(owner)
    }

    /// Cascade used when the workspace itself goes away. This is the only
    /// path, together with [`GrantManager::delete_user`], that removes owner
    /// rows.
    pub async fn delete_workspace(&self, workspace_id: &str) -> PermissionResult<bool> {
        let _guard = self.locks.lock_workspace(workspace_id).await;
        let deleted = self.workspace_repo.delete_workspace(workspace_id).await?;
        info!(workspace_id, deleted, "workspace permissions removed");
        Ok(deleted)
    }

    pub async fn delete_user(&self, user_id: &str) -> PermissionResult<u64> {
        let removed = self.workspace_repo.purge_user(user_id).await?;
        info!(user_id, removed, "user permissions removed");
        Ok(removed)
    }

    /// Invites, updates or transfers a workspace membership.
    ///
    /// - No row yet: a new unaccepted row is created with `role` and `status`.
    /// - Active row: the role changes; granting owner demotes the current
    ///   owner to admin in the same transaction.
    /// - Inactive row: `status` is applied only when it is a legal successor
    ///   of the stored status. Anything else is a no-op.
    ///
    /// Returns the membership id in every case.
    pub async fn grant(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
        status: MembershipStatus,
    ) -> PermissionResult<MembershipId> {
        let _guard = self.locks.lock_workspace(workspace_id).await;

        let Some(member) = self.member_repo.get_member(workspace_id, user_id).await? else {
            return self
                .insert_member(workspace_id, user_id, role, status)
                .await;
        };

        if member.is_active() {
            self.change_active_role(&member, role).await?;
        } else if member.status.can_transition_to(status) {
            let moved = self
                .member_repo
                .transition_status(workspace_id, user_id, member.status, status)
                .await?;
            debug!(
                workspace_id,
                user_id,
                from = %member.status,
                to = %status,
                moved,
                "membership status transition"
            );
        } else {
            debug!(
                workspace_id,
                user_id,
                from = %member.status,
                to = %status,
                "ignoring illegal membership status transition"
            );
        }

        Ok(member.id)
    }

    async fn insert_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
        status: MembershipStatus,
    ) -> PermissionResult<MembershipId> {
        let inserted = self
            .member_repo
            .insert_member(
                NewWorkspaceMember {
                    workspace_id: WorkspaceId::from(workspace_id),
                    user_id: UserId::from(user_id),
                    role,
                    status,
                    accepted: false,
                },
                now_millis(),
            )
            .await?;

        if let Some(record) = inserted {
            debug!(workspace_id, user_id, role = %role, status = %status, "membership created");
            return Ok(record.id);
        }

        // Another writer created the row between our read and insert.
        let existing = self
            .member_repo
            .get_member(workspace_id, user_id)
            .await?
            .ok_or_else(|| anyhow!("membership for {user_id} in {workspace_id} vanished"))?;
        Ok(existing.id)
    }

    async fn change_active_role(
        &self,
        member: &WorkspaceMemberRecord,
        role: WorkspaceRole,
    ) -> PermissionResult<()> {
        if member.role == role {
            return Ok(());
        }

        // Ownership only moves by promoting someone else.
        if member.is_owner() {
            debug!(
                workspace_id = %member.workspace_id,
                user_id = %member.user_id,
                role = %role,
                "refusing to demote the workspace owner directly"
            );
            return Ok(());
        }

        let demoted = self
            .member_repo
            .set_active_role(&member.workspace_id, &member.user_id, role)
            .await?;

        match demoted {
            Some(previous_owners) if role == WorkspaceRole::Owner => {
                info!(
                    workspace_id = %member.workspace_id,
                    new_owner = %member.user_id,
                    previous_owners = ?previous_owners,
                    "workspace ownership transferred"
                );
            }
            Some(_) => {
                debug!(
                    workspace_id = %member.workspace_id,
                    user_id = %member.user_id,
                    role = %role,
                    "workspace role updated"
                );
            }
            None => {
                debug!(
                    workspace_id = %member.workspace_id,
                    user_id = %member.user_id,
                    "membership no longer active, role unchanged"
                );
            }
        }

        Ok(())
    }

    /// Accepts a pending invitation. `false` means the row does not exist, was
    /// already accepted or has moved past pending; callers should not treat it
    /// as fatal.
    pub async fn accept_workspace_invitation(
        &self,
        invitation_id: &str,
        workspace_id: &str,
        status: MembershipStatus,
    ) -> PermissionResult<bool> {
        let _guard = self.locks.lock_workspace(workspace_id).await;
        let accepted = self
            .member_repo
            .accept_invitation(invitation_id, workspace_id, status)
            .await?;

        debug!(invitation_id, workspace_id, accepted, "workspace invitation accept");
        Ok(accepted)
    }

    /// Plain status write for review flows; no transition gate.
    pub async fn update_member_status(
        &self,
        workspace_id: &str,
        user_id: &str,
        status: MembershipStatus,
    ) -> PermissionResult<bool> {
        let _guard = self.locks.lock_workspace(workspace_id).await;
        Ok(self
            .member_repo
            .set_status(workspace_id, user_id, status)
            .await?)
    }

    /// Removes a non-owner membership and announces it. Owner rows are never
    /// removed here.
    pub async fn revoke_workspace(&self, workspace_id: &str, user_id: &str) -> PermissionResult<bool> {
        let guard = self.locks.lock_workspace(workspace_id).await;

        let Some(member) = self.member_repo.get_member(workspace_id, user_id).await? else {
            return Ok(false);
        };
        if member.is_owner() {
            debug!(workspace_id, user_id, "refusing to revoke the workspace owner");
            return Ok(false);
        }

        let Some(removed) = self
            .member_repo
            .delete_non_owner(workspace_id, user_id)
            .await?
        else {
            return Ok(false);
        };
        let count = self.member_repo.count_members(workspace_id).await?;
        drop(guard);

        info!(workspace_id, user_id, status = %removed.status, "workspace member revoked");

        self.notifier
            .members_updated(&removed.workspace_id, count);
        self.notifier
            .member_removed(&removed.workspace_id, &removed.user_id);
        if removed.status.needs_review() {
            self.notifier
                .membership_request_declined(&removed.workspace_id, &removed.user_id);
        }

        Ok(true)
    }

    pub async fn list_members(
        &self,
        workspace_id: &str,
        offset: i64,
        limit: i64,
    ) -> PermissionResult<Vec<WorkspaceMemberRecord>> {
        Ok(self
            .member_repo
            .list_members(workspace_id, offset.max(0), limit.max(0))
            .await?)
    }

    pub async fn member_count(&self, workspace_id: &str) -> PermissionResult<i64> {
        Ok(self.member_repo.count_members(workspace_id).await?)
    }

    /// Members occupying a seat.
    pub async fn active_member_count(&self, workspace_id: &str) -> PermissionResult<i64> {
        Ok(self
            .member_repo
            .count_with_status(workspace_id, MembershipStatus::Accepted)
            .await?)
    }

    pub async fn user_workspaces(&self, user_id: &str) -> PermissionResult<Vec<WorkspaceMemberRecord>> {
        Ok(self.member_repo.list_active_for_user(user_id).await?)
    }

    /// Upserts the user's document role. Granting owner demotes the current
    /// document owner to manager in the same transaction. An owner is never
    /// lowered through this path; that case returns `false`.
    pub async fn grant_page(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
        role: DocRole,
    ) -> PermissionResult<bool> {
        let _guard = self.locks.lock_doc(workspace_id, doc_id).await;
        self.grant_page_locked(workspace_id, doc_id, user_id, role)
            .await
    }

    /// Caller holds the doc lock.
    async fn grant_page_locked(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
        role: DocRole,
    ) -> PermissionResult<bool> {
        let demoted = self
            .doc_role_repo
            .grant_role(workspace_id, doc_id, user_id, role, now_millis())
            .await?;

        let Some(demoted) = demoted else {
            debug!(
                workspace_id,
                doc_id,
                user_id,
                role = %role,
                "refusing to demote the doc owner directly"
            );
            return Ok(false);
        };

        if role == DocRole::Owner {
            info!(
                workspace_id,
                doc_id,
                new_owner = user_id,
                previous_owners = ?demoted,
                "doc ownership transferred"
            );
        } else {
            debug!(workspace_id, doc_id, user_id, role = %role, "doc role granted");
        }

        Ok(true)
    }

    /// Grants `role` to every user. Owner grants accept exactly one target.
    /// Users that already own the document keep their owner row and are left
    /// out of the result.
    pub async fn grant_page_permission(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_ids: &[UserId],
        role: DocRole,
    ) -> PermissionResult<Vec<DocumentRoleRecord>> {
        let mut targets: Vec<UserId> = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            if !targets.contains(user_id) {
                targets.push(user_id.clone());
            }
        }

        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.locks.lock_doc(workspace_id, doc_id).await;

        if role == DocRole::Owner {
            let [owner] = targets.as_slice() else {
                return Err(PermissionError::SpaceShouldHaveOnlyOneOwner {
                    workspace_id: WorkspaceId::from(workspace_id),
                });
            };

            self.grant_page_locked(workspace_id, doc_id, owner, role)
                .await?;
            let record = self
                .doc_role_repo
                .find_for_user(workspace_id, doc_id, owner)
                .await?;
            return Ok(record.into_iter().collect());
        }

        let records = self
            .doc_role_repo
            .upsert_roles(workspace_id, doc_id, &targets, role, now_millis())
            .await?;

        if records.len() < targets.len() {
            debug!(
                workspace_id,
                doc_id,
                skipped = targets.len() - records.len(),
                "doc owner kept its role"
            );
        }
        debug!(workspace_id, doc_id, count = records.len(), role = %role, "doc roles granted");
        Ok(records)
    }

    /// Deletes the users' document roles, skipping owner rows. Returns whether
    /// anything was removed.
    pub async fn revoke_page(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_ids: &[UserId],
    ) -> PermissionResult<bool> {
        if user_ids.is_empty() {
            return Ok(false);
        }

        let _guard = self.locks.lock_doc(workspace_id, doc_id).await;
        let removed = self
            .doc_role_repo
            .remove_non_owner_roles(workspace_id, doc_id, user_ids)
            .await?;

        debug!(workspace_id, doc_id, removed, "doc roles revoked");
        Ok(removed > 0)
    }

    /// Creates the role through [`GrantManager::grant_page`] when missing,
    /// otherwise updates it in place. Owner grants always take the
    /// demotion-aware path, and an existing owner row is never downgraded
    /// here.
    pub async fn update_page_permission(
        &self,
        workspace_id: &str,
        doc_id: &str,
        user_id: &str,
        role: DocRole,
    ) -> PermissionResult<bool> {
        let _guard = self.locks.lock_doc(workspace_id, doc_id).await;

        let existing = self
            .doc_role_repo
            .find_for_user(workspace_id, doc_id, user_id)
            .await?;

        let Some(existing) = existing else {
            return self
                .grant_page_locked(workspace_id, doc_id, user_id, role)
                .await;
        };

        if existing.role == role {
            return Ok(false);
        }

        if role == DocRole::Owner {
            return self
                .grant_page_locked(workspace_id, doc_id, user_id, role)
                .await;
        }

        if existing.is_owner() {
            debug!(workspace_id, doc_id, user_id, "refusing to demote the doc owner directly");
            return Ok(false);
        }

        Ok(self
            .doc_role_repo
            .update_role(workspace_id, doc_id, user_id, role)
            .await?)
    }

    pub async fn list_doc_roles(
        &self,
        workspace_id: &str,
        doc_id: &str,
    ) -> PermissionResult<Vec<DocumentRoleRecord>> {
        Ok(self.doc_role_repo.list_for_doc(workspace_id, doc_id).await?)
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{notifier::MembershipEvent, test_support::setup_service};
    use tokio::sync::broadcast::error::TryRecvError;

    async fn add_active_member(grants: &GrantManager, workspace_id: &str, user_id: &str) {
        let id = grants
            .grant(
                workspace_id,
                user_id,
                WorkspaceRole::Collaborator,
                MembershipStatus::Pending,
            )
            .await
            .expect("invite member");
        let accepted = grants
            .accept_workspace_invitation(&id, workspace_id, MembershipStatus::Accepted)
            .await
            .expect("accept invitation");
        assert!(accepted);
    }

    async fn owners(grants: &GrantManager, workspace_id: &str) -> Vec<UserId> {
        grants
            .list_members(workspace_id, 0, 100)
            .await
            .expect("list members")
            .into_iter()
            .filter(|member| member.role == WorkspaceRole::Owner)
            .map(|member| member.user_id)
            .collect()
    }

    #[tokio::test]
    async fn grant_creates_unaccepted_membership() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        let id = grants
            .grant("ws", "alice", WorkspaceRole::Admin, MembershipStatus::Pending)
            .await
            .expect("grant");

        let members = grants.list_members("ws", 0, 10).await.expect("list");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, id);
        assert_eq!(members[0].role, WorkspaceRole::Admin);
        assert_eq!(members[0].status, MembershipStatus::Pending);
        assert!(!members[0].accepted);
        assert!(
            !service
                .access
                .is_workspace_member("ws", "alice", WorkspaceRole::Collaborator)
                .await
                .expect("member check")
        );

        let again = grants
            .grant("ws", "alice", WorkspaceRole::Admin, MembershipStatus::Pending)
            .await
            .expect("grant again");
        assert_eq!(again, id);
        assert_eq!(grants.member_count("ws").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn accept_invitation_only_matches_pending_rows() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        let id = grants
            .grant("ws", "alice", WorkspaceRole::Collaborator, MembershipStatus::Pending)
            .await
            .expect("grant");
        assert!(
            grants
                .accept_workspace_invitation(&id, "ws", MembershipStatus::Accepted)
                .await
                .expect("accept")
        );
        assert!(
            !grants
                .accept_workspace_invitation(&id, "ws", MembershipStatus::Accepted)
                .await
                .expect("accept twice")
        );
        assert!(
            !grants
                .accept_workspace_invitation("missing", "ws", MembershipStatus::Accepted)
                .await
                .expect("accept unknown")
        );

        let waiting = grants
            .grant("ws", "bob", WorkspaceRole::Collaborator, MembershipStatus::NeedMoreSeat)
            .await
            .expect("grant waitlisted");
        assert!(
            !grants
                .accept_workspace_invitation(&waiting, "ws", MembershipStatus::Accepted)
                .await
                .expect("accept waitlisted")
        );
        assert_eq!(grants.active_member_count("ws").await.expect("active"), 1);
    }

    #[tokio::test]
    async fn grant_applies_only_legal_status_transitions() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .grant("ws", "bob", WorkspaceRole::Collaborator, MembershipStatus::NeedMoreSeat)
            .await
            .expect("grant");

        // NeedMoreSeat cannot jump straight to Accepted.
        grants
            .grant("ws", "bob", WorkspaceRole::Collaborator, MembershipStatus::Accepted)
            .await
            .expect("illegal transition");
        let member = service
            .database
            .repositories()
            .workspace_member_repo()
            .get_member("ws", "bob")
            .await
            .expect("get")
            .expect("member");
        assert_eq!(member.status, MembershipStatus::NeedMoreSeat);

        grants
            .grant("ws", "bob", WorkspaceRole::Collaborator, MembershipStatus::Pending)
            .await
            .expect("legal transition");
        let member = service
            .database
            .repositories()
            .workspace_member_repo()
            .get_member("ws", "bob")
            .await
            .expect("get")
            .expect("member");
        assert_eq!(member.status, MembershipStatus::Pending);
        assert!(!member.accepted);
    }

    #[tokio::test]
    async fn owner_transfer_demotes_previous_owner() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .create_workspace("ws", "owner", WorkspaceVisibility::default())
            .await
            .expect("create workspace");
        add_active_member(grants, "ws", "alice").await;

        grants
            .grant("ws", "alice", WorkspaceRole::Owner, MembershipStatus::Accepted)
            .await
            .expect("transfer");

        assert_eq!(owners(grants, "ws").await, vec![UserId::from("alice")]);
        assert_eq!(
            service
                .access
                .workspace_role("ws", "owner")
                .await
                .expect("role"),
            Some(WorkspaceRole::Admin)
        );
        let owner = service.access.workspace_owner("ws").await.expect("owner");
        assert_eq!(owner.user_id, "alice");
    }

    #[tokio::test]
    async fn concurrent_owner_transfers_leave_one_owner() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = service.grants.clone();

        grants
            .create_workspace("ws", "owner", WorkspaceVisibility::default())
            .await
            .expect("create workspace");
        let candidates = ["a", "b", "c", "d"];
        for user in candidates {
            add_active_member(&grants, "ws", user).await;
        }

        let mut handles = Vec::new();
        for user in candidates {
            let grants = grants.clone();
            handles.push(tokio::spawn(async move {
                grants
                    .grant("ws", user, WorkspaceRole::Owner, MembershipStatus::Accepted)
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("transfer");
        }

        let owners = owners(&grants, "ws").await;
        assert_eq!(owners.len(), 1);
        assert!(candidates.contains(&owners[0].as_str()));
    }

    #[tokio::test]
    async fn owner_cannot_be_demoted_through_grant() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .create_workspace("ws", "owner", WorkspaceVisibility::default())
            .await
            .expect("create workspace");
        grants
            .grant("ws", "owner", WorkspaceRole::Collaborator, MembershipStatus::Accepted)
            .await
            .expect("grant");

        assert!(
            service
                .access
                .is_workspace_owner("ws", "owner")
                .await
                .expect("owner check")
        );
    }

    #[tokio::test]
    async fn revoke_refuses_owner() {
        let (_dir, service, notifier) = setup_service().await;
        let mut events = notifier.subscribe();

        service
            .grants
            .create_workspace("ws", "owner", WorkspaceVisibility::default())
            .await
            .expect("create workspace");

        assert!(
            !service
                .grants
                .revoke_workspace("ws", "owner")
                .await
                .expect("revoke owner")
        );
        assert!(
            !service
                .grants
                .revoke_workspace("ws", "nobody")
                .await
                .expect("revoke missing")
        );
        assert_eq!(service.grants.member_count("ws").await.expect("count"), 1);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn revoke_notifies_and_declines_pending_review() {
        let (_dir, service, notifier) = setup_service().await;
        let mut events = notifier.subscribe();
        let grants = &service.grants;

        grants
            .create_workspace("ws", "owner", WorkspaceVisibility::default())
            .await
            .expect("create workspace");
        grants
            .grant("ws", "alice", WorkspaceRole::Collaborator, MembershipStatus::UnderReview)
            .await
            .expect("grant alice");
        add_active_member(grants, "ws", "bob").await;

        assert!(grants.revoke_workspace("ws", "alice").await.expect("revoke"));
        assert_eq!(
            events.try_recv().expect("count event"),
            MembershipEvent::MembersUpdated {
                workspace_id: WorkspaceId::from("ws"),
                count: 2,
            }
        );
        assert_eq!(
            events.try_recv().expect("removed event"),
            MembershipEvent::MemberRemoved {
                workspace_id: WorkspaceId::from("ws"),
                user_id: UserId::from("alice"),
            }
        );
        assert_eq!(
            events.try_recv().expect("declined event"),
            MembershipEvent::RequestDeclined {
                workspace_id: WorkspaceId::from("ws"),
                user_id: UserId::from("alice"),
            }
        );

        assert!(grants.revoke_workspace("ws", "bob").await.expect("revoke"));
        assert!(matches!(
            events.try_recv(),
            Ok(MembershipEvent::MembersUpdated { count: 1, .. })
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(MembershipEvent::MemberRemoved { .. })
        ));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn grant_page_owner_demotes_previous_owner() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .grant_page("ws", "doc", "alice", DocRole::Owner)
            .await
            .expect("first owner");
        grants
            .grant_page("ws", "doc", "bob", DocRole::Owner)
            .await
            .expect("second owner");

        let owner = service
            .access
            .doc_owner("ws", "doc")
            .await
            .expect("owner")
            .expect("doc owner");
        assert_eq!(owner.user_id, "bob");
        assert_eq!(
            service
                .access
                .doc_role("ws", "doc", "alice")
                .await
                .expect("role"),
            Some(DocRole::Manager)
        );
    }

    #[tokio::test]
    async fn multi_target_owner_grant_is_rejected_without_mutation() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        let err = grants
            .grant_page_permission(
                "ws",
                "doc",
                &[UserId::from("u1"), UserId::from("u2")],
                DocRole::Owner,
            )
            .await
            .expect_err("two owners");
        assert!(err.is_invariant_violation());
        assert!(grants.list_doc_roles("ws", "doc").await.expect("list").is_empty());

        let granted = grants
            .grant_page_permission("ws", "doc", &[UserId::from("u1"), UserId::from("u1")], DocRole::Owner)
            .await
            .expect("single owner");
        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].role, DocRole::Owner);
    }

    #[tokio::test]
    async fn grant_page_permission_upserts_batch() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        assert!(
            grants
                .grant_page_permission("ws", "doc", &[], DocRole::Editor)
                .await
                .expect("empty")
                .is_empty()
        );

        let users = [UserId::from("u1"), UserId::from("u2")];
        let granted = grants
            .grant_page_permission("ws", "doc", &users, DocRole::Reader)
            .await
            .expect("readers");
        assert_eq!(granted.len(), 2);

        grants
            .grant_page_permission("ws", "doc", &users[..1], DocRole::Editor)
            .await
            .expect("upgrade");
        let roles = grants.list_doc_roles("ws", "doc").await.expect("list");
        let u1 = roles.iter().find(|record| record.user_id == "u1").expect("u1");
        let u2 = roles.iter().find(|record| record.user_id == "u2").expect("u2");
        assert_eq!(u1.role, DocRole::Editor);
        assert_eq!(u2.role, DocRole::Reader);
    }

    #[tokio::test]
    async fn revoke_page_skips_owner_rows() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .grant_page("ws", "doc", "owner", DocRole::Owner)
            .await
            .expect("owner");
        grants
            .grant_page("ws", "doc", "reader", DocRole::Reader)
            .await
            .expect("reader");

        assert!(!grants.revoke_page("ws", "doc", &[]).await.expect("empty"));
        assert!(
            !grants
                .revoke_page("ws", "doc", &[UserId::from("owner")])
                .await
                .expect("owner only")
        );
        assert!(
            grants
                .revoke_page("ws", "doc", &[UserId::from("owner"), UserId::from("reader")])
                .await
                .expect("mixed")
        );

        let roles = grants.list_doc_roles("ws", "doc").await.expect("list");
        assert_eq!(roles.len(), 1);
        assert!(roles[0].is_owner());
    }

    #[tokio::test]
    async fn update_page_permission_keeps_single_owner() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        assert!(
            grants
                .update_page_permission("ws", "doc", "alice", DocRole::Owner)
                .await
                .expect("create owner")
        );
        assert!(
            grants
                .update_page_permission("ws", "doc", "bob", DocRole::Reader)
                .await
                .expect("create reader")
        );
        assert!(
            grants
                .update_page_permission("ws", "doc", "bob", DocRole::Editor)
                .await
                .expect("upgrade reader")
        );
        assert!(
            !grants
                .update_page_permission("ws", "doc", "alice", DocRole::Reader)
                .await
                .expect("demote owner")
        );

        assert!(
            grants
                .update_page_permission("ws", "doc", "bob", DocRole::Owner)
                .await
                .expect("transfer")
        );
        let roles = grants.list_doc_roles("ws", "doc").await.expect("list");
        let owners: Vec<_> = roles.iter().filter(|record| record.is_owner()).collect();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].user_id, "bob");
    }

    #[tokio::test]
    async fn non_owner_grant_keeps_doc_owner() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        assert!(
            grants
                .grant_page("ws", "doc", "alice", DocRole::Owner)
                .await
                .expect("owner")
        );
        assert!(
            !grants
                .grant_page("ws", "doc", "alice", DocRole::Reader)
                .await
                .expect("lower owner")
        );

        let owner = service
            .access
            .doc_owner("ws", "doc")
            .await
            .expect("owner")
            .expect("doc owner");
        assert_eq!(owner.user_id, "alice");
    }

    #[tokio::test]
    async fn batch_grant_skips_current_doc_owner() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .grant_page("ws", "doc2", "bob", DocRole::Owner)
            .await
            .expect("owner");
        let granted = grants
            .grant_page_permission(
                "ws",
                "doc2",
                &[UserId::from("bob"), UserId::from("carol")],
                DocRole::Editor,
            )
            .await
            .expect("batch");

        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].user_id, "carol");
        assert_eq!(granted[0].role, DocRole::Editor);
        let owner = service
            .access
            .doc_owner("ws", "doc2")
            .await
            .expect("owner")
            .expect("doc owner");
        assert_eq!(owner.user_id, "bob");
    }

    #[tokio::test]
    async fn racing_role_update_never_lowers_new_doc_owner() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = service.grants.clone();

        for round in 0..10 {
            let doc = format!("doc-{round}");
            grants
                .grant_page("ws", &doc, "alice", DocRole::Owner)
                .await
                .expect("owner");
            grants
                .grant_page("ws", &doc, "bob", DocRole::Editor)
                .await
                .expect("editor");

            let transfer = {
                let grants = grants.clone();
                let doc = doc.clone();
                tokio::spawn(async move {
                    grants
                        .update_page_permission("ws", &doc, "bob", DocRole::Owner)
                        .await
                })
            };
            let lower = {
                let grants = grants.clone();
                let doc = doc.clone();
                tokio::spawn(async move {
                    grants
                        .update_page_permission("ws", &doc, "bob", DocRole::Reader)
                        .await
                })
            };
            transfer.await.expect("join").expect("transfer");
            lower.await.expect("join").expect("lower");

            let roles = grants.list_doc_roles("ws", &doc).await.expect("list");
            let owners: Vec<_> = roles.iter().filter(|record| record.is_owner()).collect();
            assert_eq!(owners.len(), 1, "{doc}");
            assert_eq!(owners[0].user_id, "bob", "{doc}");
        }
    }

    #[tokio::test]
    async fn accepting_owner_invitation_demotes_current_owner() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .create_workspace("ws", "owner", WorkspaceVisibility::default())
            .await
            .expect("create workspace");
        let invitation = grants
            .grant("ws", "mallory", WorkspaceRole::Owner, MembershipStatus::Pending)
            .await
            .expect("owner invitation");
        assert!(
            grants
                .accept_workspace_invitation(&invitation, "ws", MembershipStatus::Accepted)
                .await
                .expect("accept")
        );

        assert_eq!(owners(grants, "ws").await, vec![UserId::from("mallory")]);
        assert_eq!(
            service
                .access
                .workspace_role("ws", "owner")
                .await
                .expect("role"),
            Some(WorkspaceRole::Admin)
        );
        let owner = service.access.workspace_owner("ws").await.expect("owner");
        assert_eq!(owner.user_id, "mallory");
    }

    #[tokio::test]
    async fn status_update_to_accepted_keeps_single_owner() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .create_workspace("ws", "owner", WorkspaceVisibility::default())
            .await
            .expect("create workspace");
        grants
            .grant("ws", "mallory", WorkspaceRole::Owner, MembershipStatus::UnderReview)
            .await
            .expect("owner under review");
        assert!(
            grants
                .update_member_status("ws", "mallory", MembershipStatus::Accepted)
                .await
                .expect("approve")
        );

        assert_eq!(owners(grants, "ws").await, vec![UserId::from("mallory")]);
        assert!(
            service
                .access
                .is_workspace_member("ws", "mallory", WorkspaceRole::Owner)
                .await
                .expect("member check")
        );
        assert_eq!(
            service
                .access
                .workspace_role("ws", "owner")
                .await
                .expect("role"),
            Some(WorkspaceRole::Admin)
        );
    }

    #[tokio::test]
    async fn granting_accepted_status_activates_membership() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .grant("ws", "alice", WorkspaceRole::Collaborator, MembershipStatus::Pending)
            .await
            .expect("invite");
        grants
            .grant("ws", "alice", WorkspaceRole::Collaborator, MembershipStatus::Accepted)
            .await
            .expect("accept through grant");
        grants
            .grant("ws", "bob", WorkspaceRole::Collaborator, MembershipStatus::UnderReview)
            .await
            .expect("review");
        grants
            .grant("ws", "bob", WorkspaceRole::Collaborator, MembershipStatus::Accepted)
            .await
            .expect("approve through grant");

        for user in ["alice", "bob"] {
            assert!(
                service
                    .access
                    .is_workspace_member("ws", user, WorkspaceRole::Collaborator)
                    .await
                    .expect("member check"),
                "{user}"
            );
        }
        assert_eq!(grants.active_member_count("ws").await.expect("active"), 2);
    }

    #[tokio::test]
    async fn key_locks_are_released_after_grants() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .create_workspace("ws", "owner", WorkspaceVisibility::default())
            .await
            .expect("create workspace");
        for user in ["a", "b", "c"] {
            add_active_member(grants, "ws", user).await;
            grants
                .grant_page("ws", &format!("doc-{user}"), user, DocRole::Owner)
                .await
                .expect("doc owner");
        }
        grants.revoke_workspace("ws", "a").await.expect("revoke");

        assert!(service.locks.is_empty());
    }

    #[tokio::test]
    async fn delete_workspace_cascades_owner_rows() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .create_workspace("ws", "owner", WorkspaceVisibility::default())
            .await
            .expect("create workspace");
        add_active_member(grants, "ws", "alice").await;
        grants
            .grant_page("ws", "doc", "owner", DocRole::Owner)
            .await
            .expect("doc owner");

        assert!(grants.delete_workspace("ws").await.expect("delete"));
        assert_eq!(grants.member_count("ws").await.expect("count"), 0);
        assert!(grants.list_doc_roles("ws", "doc").await.expect("roles").is_empty());
        assert!(!grants.delete_workspace("ws").await.expect("delete twice"));
    }

    #[tokio::test]
    async fn delete_user_removes_every_membership() {
        let (_dir, service, _notifier) = setup_service().await;
        let grants = &service.grants;

        grants
            .create_workspace("ws", "owner", WorkspaceVisibility::default())
            .await
            .expect("create workspace");
        add_active_member(grants, "ws", "alice").await;
        grants
            .grant_page("ws", "doc", "alice", DocRole::Editor)
            .await
            .expect("doc role");

        assert_eq!(grants.delete_user("alice").await.expect("delete"), 2);
        assert!(grants.user_workspaces("alice").await.expect("list").is_empty());
        assert_eq!(grants.user_workspaces("owner").await.expect("list").len(), 1);
    }
}
