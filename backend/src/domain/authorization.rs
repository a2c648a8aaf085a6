//! The single authorization seam for shared resources.
//!
//! Every gateway operation resolves the caller's membership in the owning
//! family, then checks the capability flag the operation needs. Admin role
//! checks for directory/invitation operations live here too, so services
//! never re-derive permissions ad hoc.

use shared::{FamilyMember, MemberPermissions};

use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::FamilyStorage;

/// A write operation gated by a per-member permission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ViewLists,
    EditLists,
    CreateLists,
    ViewBudget,
    EditBudget,
}

impl Capability {
    /// Whether this capability is granted by the given flag set.
    pub fn granted(&self, permissions: &MemberPermissions) -> bool {
        match self {
            Capability::ViewLists => permissions.view_lists,
            Capability::EditLists => permissions.edit_lists,
            Capability::CreateLists => permissions.create_lists,
            Capability::ViewBudget => permissions.view_budget,
            Capability::EditBudget => permissions.edit_budget,
        }
    }

    /// Human wording for authorization failure messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Capability::ViewLists => "view shopping lists",
            Capability::EditLists => "edit shopping lists",
            Capability::CreateLists => "create shopping lists",
            Capability::ViewBudget => "view budgets",
            Capability::EditBudget => "edit budgets",
        }
    }
}

/// Resolve the caller's active membership in a family.
///
/// A missing membership is an authorization failure, not a not-found: the
/// caller referenced a real family they simply do not belong to.
pub(crate) async fn require_membership(
    families: &dyn FamilyStorage,
    family_id: &str,
    user_id: &str,
) -> DomainResult<FamilyMember> {
    families
        .get_member(family_id, user_id)
        .await?
        .ok_or_else(|| DomainError::authorization("you are not a member of this family"))
}

/// Admin-only operations name themselves in the failure message.
pub(crate) fn require_admin(member: &FamilyMember, action: &str) -> DomainResult<()> {
    if member.is_admin() {
        Ok(())
    } else {
        Err(DomainError::authorization(format!(
            "only admins can {action}"
        )))
    }
}

pub(crate) fn require_capability(
    member: &FamilyMember,
    capability: Capability,
) -> DomainResult<()> {
    if capability.granted(&member.permissions) {
        Ok(())
    } else {
        Err(DomainError::authorization(format!(
            "you do not have permission to {}",
            capability.describe()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{FamilyRole, MemberPermissions};

    fn member_with(permissions: MemberPermissions, role: FamilyRole) -> FamilyMember {
        FamilyMember {
            id: FamilyMember::generate_id(),
            family_id: "family::test".to_string(),
            user_id: "user-1".to_string(),
            email: "one@example.com".to_string(),
            role,
            permissions,
            joined_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn capability_maps_to_its_flag() {
        let mut perms = MemberPermissions::member_defaults();
        assert!(Capability::EditLists.granted(&perms));
        assert!(!Capability::EditBudget.granted(&perms));
        perms.edit_budget = true;
        assert!(Capability::EditBudget.granted(&perms));
    }

    #[test]
    fn admin_check_names_the_action() {
        let member = member_with(MemberPermissions::member_defaults(), FamilyRole::Member);
        let err = require_admin(&member, "invite members").unwrap_err();
        assert!(matches!(err, DomainError::Authorization(_)));
        assert!(err.to_string().contains("only admins can invite members"));

        let admin = member_with(MemberPermissions::admin_defaults(), FamilyRole::Admin);
        assert!(require_admin(&admin, "invite members").is_ok());
    }

    #[test]
    fn capability_check_reports_the_missing_permission() {
        let member = member_with(MemberPermissions::member_defaults(), FamilyRole::Member);
        let err = require_capability(&member, Capability::EditBudget).unwrap_err();
        assert!(err.to_string().contains("edit budgets"));
    }
}
