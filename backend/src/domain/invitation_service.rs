//! Invitation engine: the only component with an explicit state machine.
//!
//! ```text
//!             issue()                 accept()
//! (none) ---------------> pending ---------------> accepted (terminal)
//!                           |  \
//!                           |   \ decline()
//!                           |    -----------------> declined (terminal)
//!                           |
//!                           | time passes expires_at
//!                           v
//!                        expired (terminal, derived at read time)
//! ```
//!
//! Expiry is lazy: no sweeper runs on a schedule. Stale rows become
//! unusable once read past `expires_at`, and a re-issue to the same
//! address flips them to expired on its way in. Accept and decline are
//! conditional writes, so a raced second resolution fails with a conflict
//! instead of silently double-applying.

use chrono::{Duration, Utc};
use log::info;
use std::sync::Arc;

use crate::domain::authorization::{require_admin, require_membership};
use crate::domain::commands::invitations::{AcceptInvitationResult, IssueInvitationCommand, IssueInvitationResult};
use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::sqlite::repositories::{FamilyRepository, InvitationRepository};
use crate::storage::sqlite::DbConnection;
use crate::storage::{FamilyStorage, InvitationStorage};
use shared::{
    FamilyMember, Invitation, InvitationStatus, MemberPermissions, Requestor,
    INVITATION_VALIDITY_DAYS,
};

/// Service for issuing and resolving family invitations
#[derive(Clone)]
pub struct InvitationService {
    invitation_repository: Arc<dyn InvitationStorage>,
    family_repository: Arc<dyn FamilyStorage>,
}

impl InvitationService {
    /// Create a new InvitationService backed by SQLite
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            invitation_repository: Arc::new(InvitationRepository::new((*db).clone())),
            family_repository: Arc::new(FamilyRepository::new((*db).clone())),
        }
    }

    /// Issue an invitation. Admin-only; at most one live pending invitation
    /// per (family, email); the validity window is a fixed 7 days.
    pub async fn issue(&self, command: IssueInvitationCommand) -> DomainResult<IssueInvitationResult> {
        let email = normalize_email(&command.email)?;

        let requestor = require_membership(
            self.family_repository.as_ref(),
            &command.family_id,
            &command.requestor.user_id,
        )
        .await?;
        require_admin(&requestor, "invite members")?;

        let members = self.family_repository.list_members(&command.family_id).await?;
        if members.iter().any(|m| m.email.eq_ignore_ascii_case(&email)) {
            return Err(DomainError::conflict(
                "that email already belongs to a member of this family",
            ));
        }

        let now = Utc::now();
        if self
            .invitation_repository
            .find_live_pending(&command.family_id, &email, &now.to_rfc3339())
            .await?
            .is_some()
        {
            return Err(DomainError::conflict(
                "a pending invitation for this email already exists",
            ));
        }

        let invitation = Invitation {
            id: Invitation::generate_id(),
            family_id: command.family_id.clone(),
            invited_email: email,
            invited_by: command.requestor.user_id.clone(),
            role: command.role,
            status: InvitationStatus::Pending,
            message: command.message.clone(),
            created_at: now.to_rfc3339(),
            expires_at: (now + Duration::days(INVITATION_VALIDITY_DAYS)).to_rfc3339(),
        };
        self.invitation_repository.store_invitation(&invitation).await?;

        info!(
            "Issued invitation {} to {} for family {} as {}",
            invitation.id, invitation.invited_email, invitation.family_id, invitation.role
        );

        Ok(IssueInvitationResult {
            invitation,
            success_message: "Invitation sent".to_string(),
        })
    }

    /// Accept an invitation, creating the membership it promises.
    ///
    /// Guard order: missing row, already-resolved status, expiry, existing
    /// membership. A terminal invitation always reports a conflict even
    /// after its window has passed, so double-accept is never mistaken for
    /// expiry.
    pub async fn accept(
        &self,
        invitation_id: &str,
        requestor: &Requestor,
    ) -> DomainResult<AcceptInvitationResult> {
        let invitation = self.load_resolvable(invitation_id, requestor).await?;

        if self
            .family_repository
            .get_membership_for_user(&requestor.user_id)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict(
                "you already belong to a family; leave it before accepting an invitation",
            ));
        }

        let membership = FamilyMember {
            id: FamilyMember::generate_id(),
            family_id: invitation.family_id.clone(),
            user_id: requestor.user_id.clone(),
            email: requestor.email.trim().to_lowercase(),
            role: invitation.role,
            permissions: MemberPermissions::defaults_for_role(invitation.role),
            joined_at: Utc::now().to_rfc3339(),
        };

        let accepted = match self
            .invitation_repository
            .accept_pending(&invitation.id, &membership)
            .await
        {
            Ok(accepted) => accepted,
            // A concurrent accept can slip a membership in between the
            // pre-check above and this write; the unique constraint on
            // memberships is the backstop, and it reads as a conflict, not
            // a storage fault.
            Err(error) if is_unique_violation(&error) => {
                return Err(DomainError::conflict(
                    "you already belong to a family; leave it before accepting an invitation",
                ));
            }
            Err(error) => return Err(error.into()),
        };
        if !accepted {
            return Err(DomainError::conflict(
                "invitation was resolved by another request",
            ));
        }

        let family = self
            .family_repository
            .get_family(&invitation.family_id)
            .await?
            .ok_or_else(|| DomainError::not_found("family no longer exists"))?;

        info!(
            "Invitation {} accepted; {} joined family {} as {}",
            invitation.id, membership.user_id, family.id, membership.role
        );

        Ok(AcceptInvitationResult {
            membership,
            family,
            success_message: "Invitation accepted".to_string(),
        })
    }

    /// Decline an invitation. Same guards as accept, no membership created.
    pub async fn decline(&self, invitation_id: &str, requestor: &Requestor) -> DomainResult<()> {
        let invitation = self.load_resolvable(invitation_id, requestor).await?;

        let declined = self
            .invitation_repository
            .resolve_pending(&invitation.id, InvitationStatus::Declined)
            .await?;
        if !declined {
            return Err(DomainError::conflict(
                "invitation was resolved by another request",
            ));
        }

        info!("Invitation {} declined by {}", invitation.id, requestor.user_id);
        Ok(())
    }

    /// Cancel a still-pending invitation. Any current admin of the issuing
    /// family may cancel, not only the original issuer.
    pub async fn cancel(&self, requestor: &Requestor, invitation_id: &str) -> DomainResult<()> {
        let invitation = self
            .invitation_repository
            .get_invitation(invitation_id)
            .await?
            .ok_or_else(|| DomainError::not_found("invitation not found"))?;

        let membership = require_membership(
            self.family_repository.as_ref(),
            &invitation.family_id,
            &requestor.user_id,
        )
        .await?;
        require_admin(&membership, "cancel invitations")?;

        if invitation.status != InvitationStatus::Pending {
            return Err(DomainError::conflict(format!(
                "invitation is already {}",
                invitation.status
            )));
        }

        let deleted = self.invitation_repository.delete_pending(invitation_id).await?;
        if !deleted {
            return Err(DomainError::conflict(
                "invitation was resolved by another request",
            ));
        }

        info!("Invitation {} cancelled by {}", invitation_id, requestor.user_id);
        Ok(())
    }

    /// Live pending invitations addressed to an email. Stale rows are
    /// filtered out here at read time, never auto-declined.
    pub async fn list_pending_for_user(&self, email: &str) -> DomainResult<Vec<Invitation>> {
        let email = normalize_email(email)?;
        let now = Utc::now().to_rfc3339();
        Ok(self
            .invitation_repository
            .list_live_pending_for_email(&email, &now)
            .await?)
    }

    /// Audit view of every invitation a family has issued. Admin-only.
    /// Stored-pending rows past their window are reported as expired.
    pub async fn list_for_family(
        &self,
        requestor: &Requestor,
        family_id: &str,
    ) -> DomainResult<Vec<Invitation>> {
        let membership =
            require_membership(self.family_repository.as_ref(), family_id, &requestor.user_id)
                .await?;
        require_admin(&membership, "view the family's invitations")?;

        let now = Utc::now();
        let mut invitations = self.invitation_repository.list_for_family(family_id).await?;
        for invitation in &mut invitations {
            if invitation.status == InvitationStatus::Pending && invitation.is_expired(now) {
                invitation.status = InvitationStatus::Expired;
            }
        }
        Ok(invitations)
    }

    /// Common accept/decline guards, in order: not found, terminal status,
    /// expiry, addressee match.
    async fn load_resolvable(
        &self,
        invitation_id: &str,
        requestor: &Requestor,
    ) -> DomainResult<Invitation> {
        let invitation = self
            .invitation_repository
            .get_invitation(invitation_id)
            .await?
            .ok_or_else(|| DomainError::not_found("invitation not found"))?;

        if invitation.status != InvitationStatus::Pending {
            return Err(DomainError::conflict(format!(
                "invitation is already {}",
                invitation.status
            )));
        }

        if invitation.is_expired(Utc::now()) {
            return Err(DomainError::expired(
                "this invitation has expired; ask for a new one",
            ));
        }

        if !invitation
            .invited_email
            .eq_ignore_ascii_case(requestor.email.trim())
        {
            return Err(DomainError::authorization(
                "this invitation was issued to a different email address",
            ));
        }

        Ok(invitation)
    }
}

/// True when the error bottoms out in a database unique-constraint failure.
fn is_unique_violation(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Lowercase, trimmed, and shaped like an email address.
fn normalize_email(email: &str) -> DomainResult<String> {
    let email = email.trim().to_lowercase();

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(DomainError::validation(format!(
            "'{email}' is not a valid email address"
        )))
    }
}
