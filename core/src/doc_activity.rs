//! Reaction to document edits coming from the sync layer.

use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    db::{Database, RepositoryRegistry, doc_role_repo::DocRoleRepositoryRef},
    error::PermissionResult,
    grant::now_millis,
    ids::{DocId, UserId, WorkspaceId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocEditedEvent {
    pub workspace_id: WorkspaceId,
    pub doc_id: DocId,
    pub editor_id: UserId,
}

#[derive(Clone)]
pub struct DocActivityHandler {
    doc_role_repo: DocRoleRepositoryRef,
}

impl DocActivityHandler {
    pub fn new(database: &Database) -> Self {
        Self::from_repositories(database.repositories())
    }

    pub fn from_repositories(repositories: &RepositoryRegistry) -> Self {
        Self {
            doc_role_repo: repositories.doc_role_repo(),
        }
    }

    /// The first editor of an ownerless document becomes its owner, unless
    /// they already hold a role on it. Returns whether a row was inserted.
    pub async fn on_doc_edited(
        &self,
        workspace_id: &str,
        doc_id: &str,
        editor_id: &str,
    ) -> PermissionResult<bool> {
        let inserted = self
            .doc_role_repo
            .insert_owner_if_absent(workspace_id, doc_id, editor_id, now_millis())
            .await?;

        if inserted {
            debug!(workspace_id, doc_id, editor_id, "doc owner assigned on first edit");
        }
        Ok(inserted)
    }

    /// Drains `events` until every sender is dropped. Failures are logged and
    /// the loop keeps going.
    pub fn spawn(self, mut events: mpsc::Receiver<DocEditedEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(err) = self
                    .on_doc_edited(&event.workspace_id, &event.doc_id, &event.editor_id)
                    .await
                {
                    warn!(
                        workspace_id = %event.workspace_id,
                        doc_id = %event.doc_id,
                        editor_id = %event.editor_id,
                        error = %err,
                        "failed to record doc owner"
                    );
                }
            }
        })
    }
}
