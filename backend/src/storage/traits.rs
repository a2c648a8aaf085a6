//! # Storage Traits
//!
//! Interfaces the domain layer works against, so storage backends can be
//! swapped without touching business logic. Conditional mutations return
//! `bool`: `false` means the guarded precondition no longer held (the row
//! was gone or its status had moved on), which the domain layer maps to a
//! conflict rather than a silent double-apply.

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    Family, FamilyBudget, FamilyExpense, FamilyMember, FamilyRole, Invitation, InvitationStatus,
    ListStatus, MemberPermissions, SharedListItem, SharedShoppingList,
};

/// Families and their memberships.
#[async_trait]
pub trait FamilyStorage: Send + Sync {
    /// Insert a family and its first admin membership in one transaction.
    /// A failed membership insert rolls the family back.
    async fn create_family_with_admin(&self, family: &Family, admin: &FamilyMember) -> Result<()>;

    async fn get_family(&self, family_id: &str) -> Result<Option<Family>>;

    /// The caller's membership in a specific family, if any.
    async fn get_member(&self, family_id: &str, user_id: &str) -> Result<Option<FamilyMember>>;

    /// A user's single active membership across all families, if any.
    async fn get_membership_for_user(&self, user_id: &str) -> Result<Option<FamilyMember>>;

    /// All memberships of a family, admins first, then by join time.
    async fn list_members(&self, family_id: &str) -> Result<Vec<FamilyMember>>;

    /// How many admins the family would retain if the given user were
    /// demoted or removed.
    async fn count_admins_excluding(&self, family_id: &str, excluded_user_id: &str)
        -> Result<u32>;

    /// Insert a membership (used by invitation acceptance tests and merges).
    async fn store_member(&self, member: &FamilyMember) -> Result<()>;

    /// Returns `false` when no such membership exists.
    async fn update_member_role(
        &self,
        family_id: &str,
        user_id: &str,
        role: FamilyRole,
    ) -> Result<bool>;

    /// Returns `false` when no such membership exists.
    async fn update_member_permissions(
        &self,
        family_id: &str,
        user_id: &str,
        permissions: &MemberPermissions,
    ) -> Result<bool>;

    /// Delete a membership row (and with it the member's permission flags).
    /// Returns `false` when no such membership exists.
    async fn remove_member(&self, family_id: &str, user_id: &str) -> Result<bool>;

    /// Transactional cascade: expenses, budgets, items, lists, invitations,
    /// memberships, then the family row itself.
    async fn delete_family(&self, family_id: &str) -> Result<()>;
}

/// Invitation rows and their guarded status transitions.
#[async_trait]
pub trait InvitationStorage: Send + Sync {
    /// Stores a new invitation. Any lapsed pending row for the same
    /// (family, email) is flipped to expired in the same transaction so
    /// lazy expiry never blocks a re-issue.
    async fn store_invitation(&self, invitation: &Invitation) -> Result<()>;

    async fn get_invitation(&self, invitation_id: &str) -> Result<Option<Invitation>>;

    /// A live pending invitation for (family, email), if one exists.
    /// `now` is an RFC 3339 timestamp; rows at or past it are not live.
    async fn find_live_pending(
        &self,
        family_id: &str,
        email: &str,
        now: &str,
    ) -> Result<Option<Invitation>>;

    /// All live pending invitations addressed to an email.
    async fn list_live_pending_for_email(&self, email: &str, now: &str)
        -> Result<Vec<Invitation>>;

    /// Every invitation a family has issued, newest first.
    async fn list_for_family(&self, family_id: &str) -> Result<Vec<Invitation>>;

    /// Conditional status flip: only applies while the row still reads
    /// `pending`. Returns `false` on a lost race or missing row.
    async fn resolve_pending(
        &self,
        invitation_id: &str,
        new_status: InvitationStatus,
    ) -> Result<bool>;

    /// Accept in one transaction: flip `pending -> accepted` and insert the
    /// new membership. Returns `false` without inserting anything when the
    /// invitation was no longer pending.
    async fn accept_pending(&self, invitation_id: &str, membership: &FamilyMember)
        -> Result<bool>;

    /// Conditional delete of a still-pending invitation.
    async fn delete_pending(&self, invitation_id: &str) -> Result<bool>;
}

/// Shared shopping lists and their items.
#[async_trait]
pub trait ListStorage: Send + Sync {
    async fn store_list(&self, list: &SharedShoppingList) -> Result<()>;

    async fn get_list(&self, list_id: &str) -> Result<Option<SharedShoppingList>>;

    /// A family's lists, newest first.
    async fn list_for_family(&self, family_id: &str) -> Result<Vec<SharedShoppingList>>;

    /// Returns `false` when the list does not exist.
    async fn update_list_status(
        &self,
        list_id: &str,
        status: ListStatus,
        updated_at: &str,
    ) -> Result<bool>;

    /// Delete a list and its items in one transaction.
    async fn delete_list(&self, list_id: &str) -> Result<bool>;

    async fn store_item(&self, item: &SharedListItem) -> Result<()>;

    async fn get_item(&self, item_id: &str) -> Result<Option<SharedListItem>>;

    /// Items on a list, incomplete first, then by priority.
    async fn list_items(&self, list_id: &str) -> Result<Vec<SharedListItem>>;

    /// Full-row update of an item's editable fields.
    async fn update_item(&self, item: &SharedListItem) -> Result<()>;

    /// Single-statement write of the completion triple: `Some((user, at))`
    /// sets all three fields, `None` clears all three. Partial states are
    /// not expressible.
    async fn set_item_completion(
        &self,
        item_id: &str,
        completion: Option<(&str, &str)>,
    ) -> Result<bool>;

    async fn delete_item(&self, item_id: &str) -> Result<bool>;
}

/// Family budgets and their linked expenses.
#[async_trait]
pub trait BudgetStorage: Send + Sync {
    async fn store_budget(&self, budget: &FamilyBudget) -> Result<()>;

    async fn get_budget(&self, budget_id: &str) -> Result<Option<FamilyBudget>>;

    /// A family's budgets, newest first.
    async fn list_for_family(&self, family_id: &str) -> Result<Vec<FamilyBudget>>;

    async fn store_expense(&self, expense: &FamilyExpense) -> Result<()>;

    async fn get_expense(&self, expense_id: &str) -> Result<Option<FamilyExpense>>;

    /// Expenses linked to a budget, newest spend first.
    async fn list_expenses_for_budget(&self, budget_id: &str) -> Result<Vec<FamilyExpense>>;

    async fn update_expense(&self, expense: &FamilyExpense) -> Result<()>;

    async fn delete_expense(&self, expense_id: &str) -> Result<bool>;

    /// Re-derive `spent_amount` as the sum of the budget's current linked
    /// expenses, in a single statement. Never an increment.
    async fn recompute_spent_amount(&self, budget_id: &str) -> Result<()>;
}
