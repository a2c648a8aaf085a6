use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::sqlite::connection::DbConnection;
use crate::storage::traits::InvitationStorage;
use shared::{FamilyMember, FamilyRole, Invitation, InvitationStatus};

/// Repository for invitation rows
#[derive(Clone)]
pub struct InvitationRepository {
    db: DbConnection,
}

impl InvitationRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn invitation_from_row(row: &SqliteRow) -> Result<Invitation> {
        let role_text: String = row.get("role");
        let role = FamilyRole::parse(&role_text)
            .ok_or_else(|| anyhow!("unknown role in storage: {}", role_text))?;
        let status_text: String = row.get("status");
        let status = InvitationStatus::parse(&status_text)
            .ok_or_else(|| anyhow!("unknown invitation status in storage: {}", status_text))?;

        Ok(Invitation {
            id: row.get("id"),
            family_id: row.get("family_id"),
            invited_email: row.get("invited_email"),
            invited_by: row.get("invited_by"),
            role,
            status,
            message: row.get("message"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        })
    }
}

const INVITATION_COLUMNS: &str =
    "id, family_id, invited_email, invited_by, role, status, message, created_at, expires_at";

#[async_trait]
impl InvitationStorage for InvitationRepository {
    async fn store_invitation(&self, invitation: &Invitation) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        // Expiry is lazy, so a stale pending row for this (family, email)
        // may still be stored as 'pending'; flip it before inserting or it
        // trips the one-pending index forever.
        sqlx::query(
            r#"
            UPDATE invitations
            SET status = 'expired'
            WHERE family_id = ? AND invited_email = ? AND status = 'pending'
              AND expires_at <= ?
            "#,
        )
        .bind(&invitation.family_id)
        .bind(&invitation.invited_email)
        .bind(&invitation.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO invitations
                (id, family_id, invited_email, invited_by, role, status, message,
                 created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invitation.id)
        .bind(&invitation.family_id)
        .bind(&invitation.invited_email)
        .bind(&invitation.invited_by)
        .bind(invitation.role.as_str())
        .bind(invitation.status.as_str())
        .bind(&invitation.message)
        .bind(&invitation.created_at)
        .bind(&invitation.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_invitation(&self, invitation_id: &str) -> Result<Option<Invitation>> {
        let row = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = ?"
        ))
        .bind(invitation_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(Self::invitation_from_row).transpose()
    }

    async fn find_live_pending(
        &self,
        family_id: &str,
        email: &str,
        now: &str,
    ) -> Result<Option<Invitation>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {INVITATION_COLUMNS}
            FROM invitations
            WHERE family_id = ? AND invited_email = ? AND status = 'pending'
              AND expires_at > ?
            "#
        ))
        .bind(family_id)
        .bind(email)
        .bind(now)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(Self::invitation_from_row).transpose()
    }

    async fn list_live_pending_for_email(
        &self,
        email: &str,
        now: &str,
    ) -> Result<Vec<Invitation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {INVITATION_COLUMNS}
            FROM invitations
            WHERE invited_email = ? AND status = 'pending' AND expires_at > ?
            ORDER BY created_at DESC
            "#
        ))
        .bind(email)
        .bind(now)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::invitation_from_row).collect()
    }

    async fn list_for_family(&self, family_id: &str) -> Result<Vec<Invitation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {INVITATION_COLUMNS}
            FROM invitations
            WHERE family_id = ?
            ORDER BY created_at DESC
            "#
        ))
        .bind(family_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::invitation_from_row).collect()
    }

    async fn resolve_pending(
        &self,
        invitation_id: &str,
        new_status: InvitationStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invitations
            SET status = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(new_status.as_str())
        .bind(invitation_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn accept_pending(
        &self,
        invitation_id: &str,
        membership: &FamilyMember,
    ) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE invitations
            SET status = 'accepted'
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(invitation_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO family_members
                (id, family_id, user_id, email, role,
                 view_lists, edit_lists, create_lists, view_budget, edit_budget,
                 joined_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&membership.id)
        .bind(&membership.family_id)
        .bind(&membership.user_id)
        .bind(&membership.email)
        .bind(membership.role.as_str())
        .bind(membership.permissions.view_lists)
        .bind(membership.permissions.edit_lists)
        .bind(membership.permissions.create_lists)
        .bind(membership.permissions.view_budget)
        .bind(membership.permissions.edit_budget)
        .bind(&membership.joined_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_pending(&self, invitation_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM invitations
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(invitation_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
