//! SQLite-backed repositories.
//!
//! Every multi-statement transaction here opens with a write so that SQLite
//! takes the write lock up front (waiting on `busy_timeout`) instead of
//! failing a read-to-write upgrade under concurrent writers.

use anyhow::{Result, anyhow};
use sqlx::{Row, sqlite::SqliteRow};

use crate::{
    doc_roles::DocumentRoleRecord,
    ids::{DocId, MembershipId, UserId, WorkspaceId},
    member_status::MembershipStatus,
    roles::{DocRole, WorkspaceRole},
    workspace_member::WorkspaceMemberRecord,
};

pub mod connection;
pub mod doc_role_repo;
pub mod doc_visibility_repo;
pub mod workspace_member_repo;
pub mod workspace_repo;

pub(crate) const MEMBER_COLUMNS: &str =
    "id, workspace_id, user_id, role, status, accepted, created_at";

pub(crate) const DOC_ROLE_COLUMNS: &str = "workspace_id, doc_id, user_id, role, created_at";

pub(crate) fn map_member_row(row: &SqliteRow) -> Result<WorkspaceMemberRecord> {
    let role: i64 = row.try_get("role")?;
    let status: String = row.try_get("status")?;

    Ok(WorkspaceMemberRecord {
        id: MembershipId::from(row.try_get::<String, _>("id")?),
        workspace_id: WorkspaceId::from(row.try_get::<String, _>("workspace_id")?),
        user_id: UserId::from(row.try_get::<String, _>("user_id")?),
        role: WorkspaceRole::from_i64(role)
            .ok_or_else(|| anyhow!("unknown workspace role value {role}"))?,
        status: MembershipStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown membership status {status:?}"))?,
        accepted: row.try_get::<i64, _>("accepted")? != 0,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn map_member_rows(rows: &[SqliteRow]) -> Result<Vec<WorkspaceMemberRecord>> {
    rows.iter().map(map_member_row).collect()
}

pub(crate) fn map_doc_role_row(row: &SqliteRow) -> Result<DocumentRoleRecord> {
    let role: i64 = row.try_get("role")?;

    Ok(DocumentRoleRecord {
        workspace_id: WorkspaceId::from(row.try_get::<String, _>("workspace_id")?),
        doc_id: DocId::from(row.try_get::<String, _>("doc_id")?),
        user_id: UserId::from(row.try_get::<String, _>("user_id")?),
        role: DocRole::from_i64(role).ok_or_else(|| anyhow!("unknown doc role value {role}"))?,
        created_at: row.try_get("created_at")?,
    })
}
