use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How long an invitation stays acceptable after issuance.
pub const INVITATION_VALIDITY_DAYS: i64 = 7;

/// The authenticated identity supplied with every call.
///
/// Authentication happens upstream; the core trusts this pair as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requestor {
    pub user_id: String,
    pub email: String,
}

impl Requestor {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// A named group of collaborating users sharing lists and budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    /// Family ID in format: "family::<uuid>"
    pub id: String,
    pub name: String,
    /// User ID of the creator (also the first admin)
    pub created_by: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

impl Family {
    pub fn generate_id() -> String {
        format!("family::{}", uuid::Uuid::new_v4())
    }
}

/// Role a member holds within their family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyRole {
    Admin,
    Member,
}

impl FamilyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyRole::Admin => "admin",
            FamilyRole::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(FamilyRole::Admin),
            "member" => Some(FamilyRole::Member),
            _ => None,
        }
    }
}

impl fmt::Display for FamilyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-member capability flags gating writes beyond plain membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPermissions {
    pub view_lists: bool,
    pub edit_lists: bool,
    pub create_lists: bool,
    pub view_budget: bool,
    pub edit_budget: bool,
}

impl MemberPermissions {
    /// Admins hold every flag.
    pub fn admin_defaults() -> Self {
        Self {
            view_lists: true,
            edit_lists: true,
            create_lists: true,
            view_budget: true,
            edit_budget: true,
        }
    }

    /// Members can work with lists and see budgets; budget edits are gated.
    pub fn member_defaults() -> Self {
        Self {
            view_lists: true,
            edit_lists: true,
            create_lists: true,
            view_budget: true,
            edit_budget: false,
        }
    }

    pub fn defaults_for_role(role: FamilyRole) -> Self {
        match role {
            FamilyRole::Admin => Self::admin_defaults(),
            FamilyRole::Member => Self::member_defaults(),
        }
    }
}

/// The binding of one user to one family.
///
/// A user holds at most one active membership at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    /// Membership ID in format: "member::<uuid>"
    pub id: String,
    pub family_id: String,
    pub user_id: String,
    pub email: String,
    pub role: FamilyRole,
    pub permissions: MemberPermissions,
    /// RFC 3339 join timestamp
    pub joined_at: String,
}

impl FamilyMember {
    pub fn generate_id() -> String {
        format!("member::{}", uuid::Uuid::new_v4())
    }

    pub fn is_admin(&self) -> bool {
        self.role == FamilyRole::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "declined" => Some(InvitationStatus::Declined),
            "expired" => Some(InvitationStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-boxed offer for a non-member to join a family at a given role.
///
/// Expiry is lazy: a stored `pending` row past `expires_at` is already
/// unusable, whether or not anything ever rewrites its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    /// Invitation ID in format: "invitation::<uuid>"
    pub id: String,
    pub family_id: String,
    pub invited_email: String,
    /// User ID of the issuing admin
    pub invited_by: String,
    /// Role granted on acceptance
    pub role: FamilyRole,
    pub status: InvitationStatus,
    /// Optional personal note from the inviter
    pub message: Option<String>,
    /// RFC 3339 issuance timestamp
    pub created_at: String,
    /// RFC 3339 expiry timestamp (issuance + 7 days)
    pub expires_at: String,
}

impl Invitation {
    pub fn generate_id() -> String {
        format!("invitation::{}", uuid::Uuid::new_v4())
    }

    /// Whether this invitation is past its validity window.
    ///
    /// An unparseable expiry counts as expired rather than immortal.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires) => now > expires.with_timezone(&Utc),
            Err(_) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStatus {
    Active,
    Completed,
    Archived,
}

impl ListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListStatus::Active => "active",
            ListStatus::Completed => "completed",
            ListStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ListStatus::Active),
            "completed" => Some(ListStatus::Completed),
            "archived" => Some(ListStatus::Archived),
            _ => None,
        }
    }
}

/// A shopping list owned by a family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedShoppingList {
    /// List ID in format: "list::<uuid>"
    pub id: String,
    pub family_id: String,
    pub name: String,
    pub created_by: String,
    /// Optional spending target for this list
    pub budget_amount: Option<f64>,
    pub status: ListStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl SharedShoppingList {
    pub fn generate_id() -> String {
        format!("list::{}", uuid::Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemPriority {
    High,
    Medium,
    Low,
}

impl ItemPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemPriority::High => "high",
            ItemPriority::Medium => "medium",
            ItemPriority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(ItemPriority::High),
            "medium" => Some(ItemPriority::Medium),
            "low" => Some(ItemPriority::Low),
            _ => None,
        }
    }
}

/// One entry on a shared shopping list.
///
/// The completion triple (`completed`, `completed_by`, `completed_at`) is
/// always all-set or all-clear; no partial state exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedListItem {
    /// Item ID in format: "item::<uuid>"
    pub id: String,
    pub list_id: String,
    pub name: String,
    pub quantity: u32,
    pub estimated_price: Option<f64>,
    pub actual_price: Option<f64>,
    pub priority: ItemPriority,
    pub completed: bool,
    /// User ID of whoever checked the item off
    pub completed_by: Option<String>,
    /// RFC 3339 completion timestamp
    pub completed_at: Option<String>,
    pub added_by: String,
    pub created_at: String,
}

impl SharedListItem {
    pub fn generate_id() -> String {
        format!("item::{}", uuid::Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(BudgetPeriod::Weekly),
            "monthly" => Some(BudgetPeriod::Monthly),
            "yearly" => Some(BudgetPeriod::Yearly),
            _ => None,
        }
    }
}

/// A period-scoped spending target for a family.
///
/// `spent_amount` is derived from linked expenses and is never authored
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyBudget {
    /// Budget ID in format: "budget::<uuid>"
    pub id: String,
    pub family_id: String,
    pub name: String,
    pub total_amount: f64,
    /// Sum of linked expenses; recomputed on every expense write
    pub spent_amount: f64,
    pub period_type: BudgetPeriod,
    /// Period start (YYYY-MM-DD)
    pub start_date: String,
    /// Period end (YYYY-MM-DD)
    pub end_date: String,
    pub created_by: String,
    pub created_at: String,
}

impl FamilyBudget {
    pub fn generate_id() -> String {
        format!("budget::{}", uuid::Uuid::new_v4())
    }
}

/// A recorded spend, optionally linked to a budget and/or a shopping list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyExpense {
    /// Expense ID in format: "expense::<uuid>"
    pub id: String,
    pub family_id: String,
    pub budget_id: Option<String>,
    pub list_id: Option<String>,
    pub description: String,
    pub amount: f64,
    pub category: String,
    /// User ID of whoever paid
    pub paid_by: String,
    /// RFC 3339 timestamp of the spend itself
    pub expense_date: String,
    pub created_at: String,
}

impl FamilyExpense {
    pub fn generate_id() -> String {
        format!("expense::{}", uuid::Uuid::new_v4())
    }
}

/// Composite read of a family and its shared resources.
///
/// Secondary collections degrade to empty when their load fails; only the
/// family itself is load-bearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyOverview {
    pub family: Family,
    pub members: Vec<FamilyMember>,
    pub lists: Vec<SharedShoppingList>,
    pub budgets: Vec<FamilyBudget>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!(FamilyRole::parse("admin"), Some(FamilyRole::Admin));
        assert_eq!(FamilyRole::parse("member"), Some(FamilyRole::Member));
        assert_eq!(FamilyRole::parse("owner"), None);
        assert_eq!(FamilyRole::Admin.as_str(), "admin");
    }

    #[test]
    fn member_defaults_gate_budget_edits() {
        let perms = MemberPermissions::member_defaults();
        assert!(perms.view_budget);
        assert!(!perms.edit_budget);
        assert!(MemberPermissions::admin_defaults().edit_budget);
    }

    #[test]
    fn invitation_expiry_is_a_point_in_time() {
        let now = Utc::now();
        let mut invitation = Invitation {
            id: Invitation::generate_id(),
            family_id: Family::generate_id(),
            invited_email: "b@example.com".to_string(),
            invited_by: "user-a".to_string(),
            role: FamilyRole::Member,
            status: InvitationStatus::Pending,
            message: None,
            created_at: now.to_rfc3339(),
            expires_at: (now + Duration::days(INVITATION_VALIDITY_DAYS)).to_rfc3339(),
        };
        assert!(!invitation.is_expired(now));
        assert!(invitation.is_expired(now + Duration::days(8)));

        invitation.expires_at = "not a timestamp".to_string();
        assert!(invitation.is_expired(now));
    }
}
