use serde::{Deserialize, Serialize};

use crate::{
    ids::{DocId, UserId, WorkspaceId},
    roles::DocRole,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRoleRecord {
    pub workspace_id: WorkspaceId,
    pub doc_id: DocId,
    pub user_id: UserId,
    pub role: DocRole,
    pub created_at: i64,
}

impl DocumentRoleRecord {
    pub fn is_owner(&self) -> bool {
        self.role == DocRole::Owner
    }
}
