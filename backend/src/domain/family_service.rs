//! Family directory: family lifecycle, memberships, and roles.
//!
//! This service is the single source of truth for "who belongs to which
//! family as what". The invariants it guards:
//!
//! - a family and its first admin membership are created atomically
//! - a user holds at most one active membership
//! - a family never ends up with zero admins

use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;

use crate::domain::authorization::{require_admin, require_membership};
use crate::domain::commands::families::{
    CreateFamilyCommand, CreateFamilyResult, FamilyWithMembers, RemoveMemberCommand,
    UpdateMemberPermissionsCommand, UpdateMemberRoleCommand,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::sqlite::repositories::{BudgetRepository, FamilyRepository, ListRepository};
use crate::storage::sqlite::DbConnection;
use crate::storage::{BudgetStorage, FamilyStorage, ListStorage};
use shared::{Family, FamilyMember, FamilyOverview, FamilyRole, MemberPermissions, Requestor};

/// Service for managing families and their memberships
#[derive(Clone)]
pub struct FamilyService {
    family_repository: Arc<dyn FamilyStorage>,
    list_repository: Arc<dyn ListStorage>,
    budget_repository: Arc<dyn BudgetStorage>,
}

impl FamilyService {
    /// Create a new FamilyService backed by SQLite
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            family_repository: Arc::new(FamilyRepository::new((*db).clone())),
            list_repository: Arc::new(ListRepository::new((*db).clone())),
            budget_repository: Arc::new(BudgetRepository::new((*db).clone())),
        }
    }

    /// Create a family; the requestor becomes its first admin.
    ///
    /// The family row and the admin membership are written in one atomic
    /// unit, so a failed membership insert leaves no orphan family.
    pub async fn create_family(&self, command: CreateFamilyCommand) -> DomainResult<CreateFamilyResult> {
        let name = command.name.trim().to_string();
        if name.len() < 2 {
            return Err(DomainError::validation(
                "family name must be at least 2 characters",
            ));
        }

        if self
            .family_repository
            .get_membership_for_user(&command.requestor.user_id)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict(
                "you already belong to a family; leave it before creating a new one",
            ));
        }

        let now = Utc::now().to_rfc3339();
        let family = Family {
            id: Family::generate_id(),
            name,
            created_by: command.requestor.user_id.clone(),
            created_at: now.clone(),
        };
        let membership = FamilyMember {
            id: FamilyMember::generate_id(),
            family_id: family.id.clone(),
            user_id: command.requestor.user_id.clone(),
            email: command.requestor.email.clone(),
            role: FamilyRole::Admin,
            permissions: MemberPermissions::admin_defaults(),
            joined_at: now,
        };

        self.family_repository
            .create_family_with_admin(&family, &membership)
            .await?;

        info!(
            "Created family {} ({}) with admin {}",
            family.name, family.id, membership.user_id
        );

        Ok(CreateFamilyResult {
            family,
            membership,
            success_message: "Family created successfully".to_string(),
        })
    }

    /// The caller's family with all sibling memberships.
    ///
    /// `Ok(None)` means the user has no family, which is a normal steady
    /// state rather than a failure.
    pub async fn get_family_with_members(
        &self,
        user_id: &str,
    ) -> DomainResult<Option<FamilyWithMembers>> {
        let membership = match self
            .family_repository
            .get_membership_for_user(user_id)
            .await?
        {
            Some(m) => m,
            None => return Ok(None),
        };

        let family = self
            .family_repository
            .get_family(&membership.family_id)
            .await?
            .ok_or_else(|| DomainError::not_found("family no longer exists"))?;
        let members = self.family_repository.list_members(&family.id).await?;

        Ok(Some(FamilyWithMembers { family, members }))
    }

    /// The caller's family plus its lists and budgets in one read.
    ///
    /// A failure loading a secondary collection degrades to an empty
    /// collection; only the family itself fails the read.
    pub async fn get_family_overview(&self, user_id: &str) -> DomainResult<Option<FamilyOverview>> {
        let with_members = match self.get_family_with_members(user_id).await? {
            Some(f) => f,
            None => return Ok(None),
        };

        let lists = match self.list_repository.list_for_family(&with_members.family.id).await {
            Ok(lists) => lists,
            Err(e) => {
                warn!(
                    "Failed to load lists for family {}: {}",
                    with_members.family.id, e
                );
                Vec::new()
            }
        };

        let budgets = match self
            .budget_repository
            .list_for_family(&with_members.family.id)
            .await
        {
            Ok(budgets) => budgets,
            Err(e) => {
                warn!(
                    "Failed to load budgets for family {}: {}",
                    with_members.family.id, e
                );
                Vec::new()
            }
        };

        Ok(Some(FamilyOverview {
            family: with_members.family,
            members: with_members.members,
            lists,
            budgets,
        }))
    }

    /// Change a member's role. Admin-only; never leaves the family without
    /// an admin.
    pub async fn update_member_role(&self, command: UpdateMemberRoleCommand) -> DomainResult<()> {
        let requestor = require_membership(
            self.family_repository.as_ref(),
            &command.family_id,
            &command.requestor.user_id,
        )
        .await?;
        require_admin(&requestor, "change member roles")?;

        let target = self
            .family_repository
            .get_member(&command.family_id, &command.target_user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("member not found in this family"))?;

        if target.is_admin() && command.new_role == FamilyRole::Member {
            let remaining = self
                .family_repository
                .count_admins_excluding(&command.family_id, &command.target_user_id)
                .await?;
            if remaining == 0 {
                return Err(DomainError::invariant(
                    "cannot demote the last admin; promote another member first",
                ));
            }
        }

        let updated = self
            .family_repository
            .update_member_role(&command.family_id, &command.target_user_id, command.new_role)
            .await?;
        if !updated {
            return Err(DomainError::conflict(
                "membership changed while updating the role; re-fetch and retry",
            ));
        }

        info!(
            "Updated role of {} in family {} to {}",
            command.target_user_id, command.family_id, command.new_role
        );
        Ok(())
    }

    /// Replace a member's permission flags. Admin-only.
    pub async fn update_member_permissions(
        &self,
        command: UpdateMemberPermissionsCommand,
    ) -> DomainResult<()> {
        let requestor = require_membership(
            self.family_repository.as_ref(),
            &command.family_id,
            &command.requestor.user_id,
        )
        .await?;
        require_admin(&requestor, "change member permissions")?;

        let updated = self
            .family_repository
            .update_member_permissions(
                &command.family_id,
                &command.target_user_id,
                &command.permissions,
            )
            .await?;
        if !updated {
            return Err(DomainError::not_found("member not found in this family"));
        }

        info!(
            "Updated permissions of {} in family {}",
            command.target_user_id, command.family_id
        );
        Ok(())
    }

    /// Remove a member from a family. Admin-only; the sole admin cannot be
    /// removed. The membership row and its permission flags go away;
    /// historical items and expenses stay attributed to the user.
    pub async fn remove_member(&self, command: RemoveMemberCommand) -> DomainResult<()> {
        let requestor = require_membership(
            self.family_repository.as_ref(),
            &command.family_id,
            &command.requestor.user_id,
        )
        .await?;
        require_admin(&requestor, "remove members")?;

        let target = self
            .family_repository
            .get_member(&command.family_id, &command.target_user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("member not found in this family"))?;

        self.remove_membership(&target).await
    }

    /// Self-removal. Same sole-admin guard as `remove_member`, no admin
    /// role required.
    pub async fn leave_family(&self, requestor: &Requestor, family_id: &str) -> DomainResult<()> {
        let membership =
            require_membership(self.family_repository.as_ref(), family_id, &requestor.user_id)
                .await?;

        self.remove_membership(&membership).await
    }

    async fn remove_membership(&self, target: &FamilyMember) -> DomainResult<()> {
        if target.is_admin() {
            let remaining = self
                .family_repository
                .count_admins_excluding(&target.family_id, &target.user_id)
                .await?;
            if remaining == 0 {
                return Err(DomainError::invariant(
                    "cannot remove the last admin; promote another member first",
                ));
            }
        }

        let removed = self
            .family_repository
            .remove_member(&target.family_id, &target.user_id)
            .await?;
        if !removed {
            return Err(DomainError::conflict(
                "membership was already removed",
            ));
        }

        info!(
            "Removed member {} from family {}",
            target.user_id, target.family_id
        );
        Ok(())
    }

    /// Delete a family and everything it owns: memberships, invitations,
    /// lists, items, budgets, expenses. Admin-only.
    pub async fn delete_family(&self, requestor: &Requestor, family_id: &str) -> DomainResult<()> {
        self.family_repository
            .get_family(family_id)
            .await?
            .ok_or_else(|| DomainError::not_found("family not found"))?;

        let membership =
            require_membership(self.family_repository.as_ref(), family_id, &requestor.user_id)
                .await?;
        require_admin(&membership, "delete the family")?;

        self.family_repository.delete_family(family_id).await?;

        info!("Deleted family {} and all shared resources", family_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test() -> FamilyService {
        let db = Arc::new(
            DbConnection::init_test()
                .await
                .expect("Failed to create test database"),
        );
        FamilyService::new(db)
    }

    fn requestor(n: &str) -> Requestor {
        Requestor::new(format!("user-{n}"), format!("{n}@example.com"))
    }

    async fn create_family(service: &FamilyService, owner: &Requestor) -> CreateFamilyResult {
        service
            .create_family(CreateFamilyCommand {
                requestor: owner.clone(),
                name: "Smiths".to_string(),
            })
            .await
            .expect("Failed to create family")
    }

    async fn add_member(
        service: &FamilyService,
        family_id: &str,
        who: &Requestor,
        role: FamilyRole,
    ) {
        service
            .family_repository
            .store_member(&FamilyMember {
                id: FamilyMember::generate_id(),
                family_id: family_id.to_string(),
                user_id: who.user_id.clone(),
                email: who.email.clone(),
                role,
                permissions: MemberPermissions::defaults_for_role(role),
                joined_at: Utc::now().to_rfc3339(),
            })
            .await
            .expect("Failed to store member");
    }

    #[tokio::test]
    async fn test_create_family_creates_admin_membership() {
        let service = setup_test().await;
        let alice = requestor("alice");

        let result = create_family(&service, &alice).await;
        assert_eq!(result.family.name, "Smiths");
        assert_eq!(result.membership.role, FamilyRole::Admin);
        assert!(result.membership.permissions.edit_budget);

        let loaded = service
            .get_family_with_members(&alice.user_id)
            .await
            .expect("Failed to load family")
            .expect("Family should exist");
        assert_eq!(loaded.family.id, result.family.id);
        assert_eq!(loaded.members.len(), 1);
        assert_eq!(loaded.members[0].user_id, alice.user_id);
    }

    #[tokio::test]
    async fn test_create_family_rejects_short_name() {
        let service = setup_test().await;

        let result = service
            .create_family(CreateFamilyCommand {
                requestor: requestor("alice"),
                name: "  a  ".to_string(),
            })
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_family_rejects_existing_member() {
        let service = setup_test().await;
        let alice = requestor("alice");
        create_family(&service, &alice).await;

        let result = service
            .create_family(CreateFamilyCommand {
                requestor: alice,
                name: "Second".to_string(),
            })
            .await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_no_family_is_a_valid_steady_state() {
        let service = setup_test().await;

        let loaded = service
            .get_family_with_members("user-nobody")
            .await
            .expect("Lookup should not fail");
        assert!(loaded.is_none());

        let overview = service
            .get_family_overview("user-nobody")
            .await
            .expect("Lookup should not fail");
        assert!(overview.is_none());
    }

    #[tokio::test]
    async fn test_update_member_role_requires_admin() {
        let service = setup_test().await;
        let alice = requestor("alice");
        let bob = requestor("bob");
        let family = create_family(&service, &alice).await.family;
        add_member(&service, &family.id, &bob, FamilyRole::Member).await;

        let result = service
            .update_member_role(UpdateMemberRoleCommand {
                requestor: bob.clone(),
                family_id: family.id.clone(),
                target_user_id: alice.user_id.clone(),
                new_role: FamilyRole::Member,
            })
            .await;
        assert!(matches!(result, Err(DomainError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_demoting_sole_admin_is_rejected() {
        let service = setup_test().await;
        let alice = requestor("alice");
        let bob = requestor("bob");
        let family = create_family(&service, &alice).await.family;
        add_member(&service, &family.id, &bob, FamilyRole::Member).await;

        let result = service
            .update_member_role(UpdateMemberRoleCommand {
                requestor: alice.clone(),
                family_id: family.id.clone(),
                target_user_id: alice.user_id.clone(),
                new_role: FamilyRole::Member,
            })
            .await;
        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));

        // State unchanged: alice is still the admin
        let members = service
            .get_family_with_members(&alice.user_id)
            .await
            .unwrap()
            .unwrap()
            .members;
        let alice_row = members.iter().find(|m| m.user_id == alice.user_id).unwrap();
        assert_eq!(alice_row.role, FamilyRole::Admin);
    }

    #[tokio::test]
    async fn test_demotion_allowed_once_another_admin_exists() {
        let service = setup_test().await;
        let alice = requestor("alice");
        let bob = requestor("bob");
        let family = create_family(&service, &alice).await.family;
        add_member(&service, &family.id, &bob, FamilyRole::Member).await;

        service
            .update_member_role(UpdateMemberRoleCommand {
                requestor: alice.clone(),
                family_id: family.id.clone(),
                target_user_id: bob.user_id.clone(),
                new_role: FamilyRole::Admin,
            })
            .await
            .expect("Promotion should succeed");

        service
            .update_member_role(UpdateMemberRoleCommand {
                requestor: alice.clone(),
                family_id: family.id.clone(),
                target_user_id: alice.user_id.clone(),
                new_role: FamilyRole::Member,
            })
            .await
            .expect("Demotion should succeed now that bob is an admin");
    }

    #[tokio::test]
    async fn test_removing_sole_admin_is_rejected() {
        let service = setup_test().await;
        let alice = requestor("alice");
        let bob = requestor("bob");
        let family = create_family(&service, &alice).await.family;
        add_member(&service, &family.id, &bob, FamilyRole::Member).await;

        let result = service
            .remove_member(RemoveMemberCommand {
                requestor: alice.clone(),
                family_id: family.id.clone(),
                target_user_id: alice.user_id.clone(),
            })
            .await;
        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_remove_member_deletes_live_membership() {
        let service = setup_test().await;
        let alice = requestor("alice");
        let bob = requestor("bob");
        let family = create_family(&service, &alice).await.family;
        add_member(&service, &family.id, &bob, FamilyRole::Member).await;

        service
            .remove_member(RemoveMemberCommand {
                requestor: alice.clone(),
                family_id: family.id.clone(),
                target_user_id: bob.user_id.clone(),
            })
            .await
            .expect("Removal should succeed");

        assert!(service
            .get_family_with_members(&bob.user_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_leave_family() {
        let service = setup_test().await;
        let alice = requestor("alice");
        let bob = requestor("bob");
        let family = create_family(&service, &alice).await.family;
        add_member(&service, &family.id, &bob, FamilyRole::Member).await;

        // Sole admin cannot walk away
        let result = service.leave_family(&alice, &family.id).await;
        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));

        // A plain member can
        service
            .leave_family(&bob, &family.id)
            .await
            .expect("Member should be able to leave");
        assert!(service
            .get_family_with_members(&bob.user_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_member_permissions() {
        let service = setup_test().await;
        let alice = requestor("alice");
        let bob = requestor("bob");
        let family = create_family(&service, &alice).await.family;
        add_member(&service, &family.id, &bob, FamilyRole::Member).await;

        let mut perms = MemberPermissions::member_defaults();
        perms.edit_budget = true;
        service
            .update_member_permissions(UpdateMemberPermissionsCommand {
                requestor: alice.clone(),
                family_id: family.id.clone(),
                target_user_id: bob.user_id.clone(),
                permissions: perms,
            })
            .await
            .expect("Permission update should succeed");

        let members = service
            .get_family_with_members(&alice.user_id)
            .await
            .unwrap()
            .unwrap()
            .members;
        let bob_row = members.iter().find(|m| m.user_id == bob.user_id).unwrap();
        assert!(bob_row.permissions.edit_budget);

        // Non-admin cannot touch flags
        let result = service
            .update_member_permissions(UpdateMemberPermissionsCommand {
                requestor: bob.clone(),
                family_id: family.id.clone(),
                target_user_id: alice.user_id.clone(),
                permissions: MemberPermissions::member_defaults(),
            })
            .await;
        assert!(matches!(result, Err(DomainError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_delete_family_requires_admin_and_cascades() {
        let service = setup_test().await;
        let alice = requestor("alice");
        let bob = requestor("bob");
        let family = create_family(&service, &alice).await.family;
        add_member(&service, &family.id, &bob, FamilyRole::Member).await;

        let result = service.delete_family(&bob, &family.id).await;
        assert!(matches!(result, Err(DomainError::Authorization(_))));

        service
            .delete_family(&alice, &family.id)
            .await
            .expect("Admin should be able to delete the family");

        assert!(service
            .get_family_with_members(&alice.user_id)
            .await
            .unwrap()
            .is_none());
        assert!(service
            .get_family_with_members(&bob.user_id)
            .await
            .unwrap()
            .is_none());

        let result = service.delete_family(&alice, &family.id).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }
}
