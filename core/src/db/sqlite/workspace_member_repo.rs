use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};

use crate::{
    db::workspace_member_repo::WorkspaceMemberRepository,
    ids::{MembershipId, UserId},
    member_status::MembershipStatus,
    roles::WorkspaceRole,
    workspace_member::{NewWorkspaceMember, WorkspaceMemberRecord},
};

use super::{MEMBER_COLUMNS, connection::SqlitePool, map_member_row, map_member_rows};

pub struct SqliteWorkspaceMemberRepository {
    pool: SqlitePool,
}

impl SqliteWorkspaceMemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Demotes every active owner of the workspace except `user_id` to admin.
async fn demote_other_owners(
    conn: &mut SqliteConnection,
    workspace_id: &str,
    user_id: &str,
) -> Result<Vec<UserId>> {
    let rows = sqlx::query(
        "UPDATE workspace_members
         SET role = ?
         WHERE workspace_id = ?
           AND user_id != ?
           AND role = ?
           AND accepted = 1
           AND status = ?
         RETURNING user_id",
    )
    .bind(WorkspaceRole::demoted_owner().as_i64())
    .bind(workspace_id)
    .bind(user_id)
    .bind(WorkspaceRole::Owner.as_i64())
    .bind(MembershipStatus::Accepted.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| Ok(UserId::from(row.try_get::<String, _>("user_id")?)))
        .collect()
}

/// Finishes a status write whose `RETURNING workspace_id, user_id, role,
/// status, accepted` row is `row`: when the write made an owner row active,
/// any other active owner is demoted before commit.
async fn settle_status_write(conn: &mut SqliteConnection, row: &SqliteRow) -> Result<()> {
    let role: i64 = row.try_get("role")?;
    let status: String = row.try_get("status")?;
    let accepted = row.try_get::<i64, _>("accepted")? != 0;

    let now_active_owner = role == WorkspaceRole::Owner.as_i64()
        && accepted
        && status == MembershipStatus::Accepted.as_str();
    if now_active_owner {
        let workspace_id: String = row.try_get("workspace_id")?;
        let user_id: String = row.try_get("user_id")?;
        demote_other_owners(conn, &workspace_id, &user_id).await?;
    }

    Ok(())
}

const STATUS_WRITE_RETURNING: &str = "RETURNING workspace_id, user_id, role, status, accepted";

#[async_trait]
impl WorkspaceMemberRepository for SqliteWorkspaceMemberRepository {
    async fn get_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMemberRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS}
             FROM workspace_members
             WHERE workspace_id = ? AND user_id = ?"
        ))
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_member_row).transpose()
    }

    async fn find_active_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMemberRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS}
             FROM workspace_members
             WHERE workspace_id = ? AND user_id = ? AND accepted = 1 AND status = ?"
        ))
        .bind(workspace_id)
        .bind(user_id)
        .bind(MembershipStatus::Accepted.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_member_row).transpose()
    }

    async fn count_active_at_least(
        &self,
        workspace_id: &str,
        user_id: &str,
        min_role: WorkspaceRole,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)
             FROM workspace_members
             WHERE workspace_id = ?
               AND user_id = ?
               AND accepted = 1
               AND status = ?
               AND role >= ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(MembershipStatus::Accepted.as_str())
        .bind(min_role.as_i64())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn find_active_owner(&self, workspace_id: &str) -> Result<Option<WorkspaceMemberRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS}
             FROM workspace_members
             WHERE workspace_id = ? AND role = ? AND accepted = 1 AND status = ?
             ORDER BY created_at ASC, rowid ASC
             LIMIT 1"
        ))
        .bind(workspace_id)
        .bind(WorkspaceRole::Owner.as_i64())
        .bind(MembershipStatus::Accepted.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_member_row).transpose()
    }

    async fn insert_member(
        &self,
        member: NewWorkspaceMember,
        created_at: i64,
    ) -> Result<Option<WorkspaceMemberRecord>> {
        let NewWorkspaceMember {
            workspace_id,
            user_id,
            role,
            status,
            accepted,
        } = member;
        let id = MembershipId::generate();

        let result = sqlx::query(
            "INSERT INTO workspace_members (
                 id,
                 workspace_id,
                 user_id,
                 role,
                 status,
                 accepted,
                 created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(workspace_id, user_id) DO NOTHING",
        )
        .bind(&id)
        .bind(&workspace_id)
        .bind(&user_id)
        .bind(role.as_i64())
        .bind(status.as_str())
        .bind(accepted)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(WorkspaceMemberRecord {
            id,
            workspace_id,
            user_id,
            role,
            status,
            accepted,
            created_at,
        }))
    }

    async fn set_active_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<Option<Vec<UserId>>> {
        let mut tx = self.pool.begin().await?;

        let demoted = if role == WorkspaceRole::Owner {
            demote_other_owners(&mut tx, workspace_id, user_id).await?
        } else {
            Vec::new()
        };

        let promoted = sqlx::query(
            "UPDATE workspace_members
             SET role = ?
             WHERE workspace_id = ? AND user_id = ? AND accepted = 1 AND status = ?",
        )
        .bind(role.as_i64())
        .bind(workspace_id)
        .bind(user_id)
        .bind(MembershipStatus::Accepted.as_str())
        .execute(&mut *tx)
        .await?;

        if promoted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(demoted))
    }

    async fn transition_status(
        &self,
        workspace_id: &str,
        user_id: &str,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "UPDATE workspace_members
             SET status = ?,
                 accepted = CASE WHEN ? THEN 1 ELSE accepted END
             WHERE workspace_id = ? AND user_id = ? AND status = ?
             {STATUS_WRITE_RETURNING}"
        ))
        .bind(to.as_str())
        .bind(to == MembershipStatus::Accepted)
        .bind(workspace_id)
        .bind(user_id)
        .bind(from.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(false);
        };
        settle_status_write(&mut tx, &row).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn set_status(
        &self,
        workspace_id: &str,
        user_id: &str,
        status: MembershipStatus,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "UPDATE workspace_members
             SET status = ?,
                 accepted = CASE WHEN ? THEN 1 ELSE accepted END
             WHERE workspace_id = ? AND user_id = ?
             {STATUS_WRITE_RETURNING}"
        ))
        .bind(status.as_str())
        .bind(status == MembershipStatus::Accepted)
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(false);
        };
        settle_status_write(&mut tx, &row).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn accept_invitation(
        &self,
        membership_id: &str,
        workspace_id: &str,
        status: MembershipStatus,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "UPDATE workspace_members
             SET accepted = 1, status = ?
             WHERE id = ? AND workspace_id = ? AND accepted = 0 AND status = ?
             {STATUS_WRITE_RETURNING}"
        ))
        .bind(status.as_str())
        .bind(membership_id)
        .bind(workspace_id)
        .bind(MembershipStatus::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(false);
        };
        settle_status_write(&mut tx, &row).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete_non_owner(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMemberRecord>> {
        let row = sqlx::query(&format!(
            "DELETE FROM workspace_members
             WHERE workspace_id = ? AND user_id = ? AND role != ?
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(workspace_id)
        .bind(user_id)
        .bind(WorkspaceRole::Owner.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_member_row).transpose()
    }

    async fn count_members(&self, workspace_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM workspace_members WHERE workspace_id = ?")
                .bind(workspace_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn count_with_status(
        &self,
        workspace_id: &str,
        status: MembershipStatus,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM workspace_members WHERE workspace_id = ? AND status = ?",
        )
        .bind(workspace_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn promote_waitlisted(
        &self,
        workspace_id: &str,
        seat_limit: i64,
    ) -> Result<Vec<WorkspaceMemberRecord>> {
        let [need_seat, need_seat_and_review] = MembershipStatus::WAITLISTED;

        let mut tx = self.pool.begin().await?;
        // Seat usage, FIFO selection and both status moves run as one
        // statement so the write lock is held from the first read on.
        let rows = sqlx::query(&format!(
            "UPDATE workspace_members
             SET status = CASE status WHEN ? THEN ? ELSE ? END
             WHERE id IN (
                 SELECT id
                 FROM workspace_members
                 WHERE workspace_id = ? AND status IN (?, ?)
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT MAX(
                     0,
                     ? - (
                         SELECT COUNT(*)
                         FROM workspace_members
                         WHERE workspace_id = ? AND status = ?
                     )
                 )
             )
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(need_seat.as_str())
        .bind(need_seat.after_seat_allocated().as_str())
        .bind(need_seat_and_review.after_seat_allocated().as_str())
        .bind(workspace_id)
        .bind(need_seat.as_str())
        .bind(need_seat_and_review.as_str())
        .bind(seat_limit)
        .bind(workspace_id)
        .bind(MembershipStatus::Accepted.as_str())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut promoted = map_member_rows(&rows)?;
        promoted.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(promoted)
    }

    async fn list_members(
        &self,
        workspace_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<WorkspaceMemberRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS}
             FROM workspace_members
             WHERE workspace_id = ?
             ORDER BY created_at ASC, rowid ASC
             LIMIT ? OFFSET ?"
        ))
        .bind(workspace_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        map_member_rows(&rows)
    }

    async fn list_active_for_user(&self, user_id: &str) -> Result<Vec<WorkspaceMemberRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS}
             FROM workspace_members
             WHERE user_id = ? AND accepted = 1 AND status = ?
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(user_id)
        .bind(MembershipStatus::Accepted.as_str())
        .fetch_all(&self.pool)
        .await?;

        map_member_rows(&rows)
    }
}
