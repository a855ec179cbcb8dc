use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::ids::{UserId, WorkspaceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MembershipEvent {
    #[serde(rename_all = "camelCase")]
    MembersUpdated { workspace_id: WorkspaceId, count: i64 },
    #[serde(rename_all = "camelCase")]
    MemberRemoved {
        workspace_id: WorkspaceId,
        user_id: UserId,
    },
    #[serde(rename_all = "camelCase")]
    RequestDeclined {
        workspace_id: WorkspaceId,
        user_id: UserId,
    },
}

/// Receives membership changes after they have been committed.
///
/// Calls are fire-and-forget: implementations must not fail the caller and
/// must not block on slow consumers.
pub trait MembershipNotifier: Send + Sync {
    fn members_updated(&self, workspace_id: &WorkspaceId, count: i64);

    fn member_removed(&self, workspace_id: &WorkspaceId, user_id: &UserId);

    fn membership_request_declined(&self, workspace_id: &WorkspaceId, user_id: &UserId);
}

pub type MembershipNotifierRef = Arc<dyn MembershipNotifier>;

/// Publishes every event on a broadcast channel.
#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<MembershipEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _rx) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.sender.subscribe()
    }

    fn emit(&self, event: MembershipEvent) {
        // No receivers is the common case outside of tests.
        if self.sender.receiver_count() == 0 {
            return;
        }

        if let Err(err) = self.sender.send(event) {
            warn!(?err, "failed to emit membership event");
        }
    }
}

impl MembershipNotifier for BroadcastNotifier {
    fn members_updated(&self, workspace_id: &WorkspaceId, count: i64) {
        self.emit(MembershipEvent::MembersUpdated {
            workspace_id: workspace_id.clone(),
            count,
        });
    }

    fn member_removed(&self, workspace_id: &WorkspaceId, user_id: &UserId) {
        self.emit(MembershipEvent::MemberRemoved {
            workspace_id: workspace_id.clone(),
            user_id: user_id.clone(),
        });
    }

    fn membership_request_declined(&self, workspace_id: &WorkspaceId, user_id: &UserId) {
        self.emit(MembershipEvent::RequestDeclined {
            workspace_id: workspace_id.clone(),
            user_id: user_id.clone(),
        });
    }
}

/// Writes events to the log only.
#[derive(Clone, Copy, Default)]
pub struct TracingNotifier;

impl MembershipNotifier for TracingNotifier {
    fn members_updated(&self, workspace_id: &WorkspaceId, count: i64) {
        info!(%workspace_id, count, "workspace members updated");
    }

    fn member_removed(&self, workspace_id: &WorkspaceId, user_id: &UserId) {
        info!(%workspace_id, %user_id, "workspace member removed");
    }

    fn membership_request_declined(&self, workspace_id: &WorkspaceId, user_id: &UserId) {
        info!(%workspace_id, %user_id, "workspace membership request declined");
    }
}
