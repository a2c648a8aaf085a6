//! Domain-level command and result types.
//!
//! These structs are the inputs and outputs of the domain services. A
//! presentation layer maps its own DTOs to these; simple lookups take plain
//! arguments instead.

pub mod families {
    use shared::{Family, FamilyMember, FamilyRole, MemberPermissions, Requestor};

    /// Input for creating a family.
    #[derive(Debug, Clone)]
    pub struct CreateFamilyCommand {
        pub requestor: Requestor,
        pub name: String,
    }

    /// Result of creating a family: the family plus its first admin
    /// membership, created in the same atomic unit.
    #[derive(Debug, Clone)]
    pub struct CreateFamilyResult {
        pub family: Family,
        pub membership: FamilyMember,
        pub success_message: String,
    }

    /// A family together with all of its active memberships.
    #[derive(Debug, Clone)]
    pub struct FamilyWithMembers {
        pub family: Family,
        pub members: Vec<FamilyMember>,
    }

    /// Input for changing a member's role.
    #[derive(Debug, Clone)]
    pub struct UpdateMemberRoleCommand {
        pub requestor: Requestor,
        pub family_id: String,
        pub target_user_id: String,
        pub new_role: FamilyRole,
    }

    /// Input for replacing a member's permission flags.
    #[derive(Debug, Clone)]
    pub struct UpdateMemberPermissionsCommand {
        pub requestor: Requestor,
        pub family_id: String,
        pub target_user_id: String,
        pub permissions: MemberPermissions,
    }

    /// Input for removing a member from a family.
    #[derive(Debug, Clone)]
    pub struct RemoveMemberCommand {
        pub requestor: Requestor,
        pub family_id: String,
        pub target_user_id: String,
    }
}

pub mod invitations {
    use shared::{Family, FamilyMember, FamilyRole, Invitation, Requestor};

    /// Input for issuing an invitation.
    #[derive(Debug, Clone)]
    pub struct IssueInvitationCommand {
        pub requestor: Requestor,
        pub family_id: String,
        pub email: String,
        pub role: FamilyRole,
        pub message: Option<String>,
    }

    /// Result of issuing an invitation.
    #[derive(Debug, Clone)]
    pub struct IssueInvitationResult {
        pub invitation: Invitation,
        pub success_message: String,
    }

    /// Result of accepting an invitation: the new membership and the family
    /// it joins.
    #[derive(Debug, Clone)]
    pub struct AcceptInvitationResult {
        pub membership: FamilyMember,
        pub family: Family,
        pub success_message: String,
    }
}

pub mod lists {
    use shared::{ItemPriority, ListStatus, Requestor, SharedListItem, SharedShoppingList};

    /// Input for creating a shared shopping list.
    #[derive(Debug, Clone)]
    pub struct CreateListCommand {
        pub requestor: Requestor,
        pub family_id: String,
        pub name: String,
        pub budget_amount: Option<f64>,
    }

    /// Result of creating a shared shopping list.
    #[derive(Debug, Clone)]
    pub struct CreateListResult {
        pub list: SharedShoppingList,
        pub success_message: String,
    }

    /// Input for adding an item to a list.
    #[derive(Debug, Clone)]
    pub struct AddItemCommand {
        pub requestor: Requestor,
        pub list_id: String,
        pub name: String,
        pub quantity: u32,
        pub estimated_price: Option<f64>,
        pub priority: ItemPriority,
    }

    /// Input for editing an item; `None` fields are left untouched.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateItemCommand {
        pub name: Option<String>,
        pub quantity: Option<u32>,
        pub estimated_price: Option<f64>,
        pub actual_price: Option<f64>,
        pub priority: Option<ItemPriority>,
    }

    /// Input for checking an item off (or back on).
    #[derive(Debug, Clone)]
    pub struct CompleteItemCommand {
        pub requestor: Requestor,
        pub item_id: String,
        pub completed: bool,
    }

    /// Input for moving a list through its lifecycle.
    #[derive(Debug, Clone)]
    pub struct UpdateListStatusCommand {
        pub requestor: Requestor,
        pub list_id: String,
        pub status: ListStatus,
    }
}

pub mod budgets {
    use shared::{BudgetPeriod, FamilyBudget, FamilyExpense, Requestor};

    /// Input for creating a family budget.
    #[derive(Debug, Clone)]
    pub struct CreateBudgetCommand {
        pub requestor: Requestor,
        pub family_id: String,
        pub name: String,
        pub total_amount: f64,
        pub period_type: BudgetPeriod,
        /// Period start (YYYY-MM-DD)
        pub start_date: String,
        /// Period end (YYYY-MM-DD)
        pub end_date: String,
    }

    /// Result of creating a family budget.
    #[derive(Debug, Clone)]
    pub struct CreateBudgetResult {
        pub budget: FamilyBudget,
        pub success_message: String,
    }

    /// Input for recording an expense, optionally linked to a budget
    /// and/or a shopping list.
    #[derive(Debug, Clone)]
    pub struct RecordExpenseCommand {
        pub requestor: Requestor,
        pub family_id: String,
        pub description: String,
        pub amount: f64,
        pub category: String,
        pub budget_id: Option<String>,
        pub list_id: Option<String>,
        /// RFC 3339 override; defaults to now
        pub expense_date: Option<String>,
    }

    /// Result of recording an expense.
    #[derive(Debug, Clone)]
    pub struct RecordExpenseResult {
        pub expense: FamilyExpense,
        pub success_message: String,
    }

    /// Input for editing an expense; `None` fields are left untouched.
    /// Budget/list links are fixed at creation; relinking is a delete and
    /// re-record.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateExpenseCommand {
        pub description: Option<String>,
        pub amount: Option<f64>,
        pub category: Option<String>,
    }
}
