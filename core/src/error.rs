use anyhow::Error as AnyError;
use thiserror::Error;

use crate::ids::{DocId, WorkspaceId};

pub type PermissionResult<T> = Result<T, PermissionError>;

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("You do not have permission to access Space {workspace_id}.")]
    SpaceAccessDenied { workspace_id: WorkspaceId },

    #[error("You do not have permission to access doc {doc_id} under Space {workspace_id}.")]
    DocAccessDenied {
        workspace_id: WorkspaceId,
        doc_id: DocId,
    },

    #[error("Owner of Space {workspace_id} not found.")]
    SpaceOwnerNotFound { workspace_id: WorkspaceId },

    #[error("Space {workspace_id} must have exactly one owner.")]
    SpaceShouldHaveOnlyOneOwner { workspace_id: WorkspaceId },

    /// Storage and transaction failures, passed through untouched so callers
    /// can apply their own retry policy.
    #[error(transparent)]
    Storage(#[from] AnyError),
}

impl PermissionError {
    pub(crate) fn space_access_denied(workspace_id: &WorkspaceId) -> Self {
        Self::SpaceAccessDenied {
            workspace_id: workspace_id.clone(),
        }
    }

    pub(crate) fn doc_access_denied(workspace_id: &WorkspaceId, doc_id: &DocId) -> Self {
        Self::DocAccessDenied {
            workspace_id: workspace_id.clone(),
            doc_id: doc_id.clone(),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::SpaceAccessDenied { .. } => "SPACE_ACCESS_DENIED",
            Self::DocAccessDenied { .. } => "DOC_ACCESS_DENIED",
            Self::SpaceOwnerNotFound { .. } => "OWNER_NOT_FOUND",
            Self::SpaceShouldHaveOnlyOneOwner { .. } => "SPACE_SHOULD_HAVE_ONLY_ONE_OWNER",
            Self::Storage(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub const fn is_access_denied(&self) -> bool {
        matches!(
            self,
            Self::SpaceAccessDenied { .. } | Self::DocAccessDenied { .. }
        )
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::SpaceOwnerNotFound { .. })
    }

    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::SpaceShouldHaveOnlyOneOwner { .. })
    }
}
