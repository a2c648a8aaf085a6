//! Gateway over family budgets and expenses.
//!
//! `spent_amount` is derived state: every expense write ends by re-deriving
//! the linked budget's total from the full expense set, so corrections and
//! concurrent edits can never drift it. Budgets are visible to every
//! member; edits are gated by the per-member budget flag.

use chrono::{NaiveDate, Utc};
use log::info;
use std::sync::Arc;

use crate::domain::authorization::{require_capability, require_membership, Capability};
use crate::domain::commands::budgets::{
    CreateBudgetCommand, CreateBudgetResult, RecordExpenseCommand, RecordExpenseResult,
    UpdateExpenseCommand,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::sqlite::repositories::{BudgetRepository, FamilyRepository, ListRepository};
use crate::storage::sqlite::DbConnection;
use crate::storage::{BudgetStorage, FamilyStorage, ListStorage};
use shared::{FamilyBudget, FamilyExpense, Requestor};

/// Service for family budgets and expense tracking
#[derive(Clone)]
pub struct BudgetService {
    budget_repository: Arc<dyn BudgetStorage>,
    family_repository: Arc<dyn FamilyStorage>,
    list_repository: Arc<dyn ListStorage>,
}

impl BudgetService {
    /// Create a new BudgetService backed by SQLite
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            budget_repository: Arc::new(BudgetRepository::new((*db).clone())),
            family_repository: Arc::new(FamilyRepository::new((*db).clone())),
            list_repository: Arc::new(ListRepository::new((*db).clone())),
        }
    }

    /// Create a budget for a family.
    pub async fn create_budget(&self, command: CreateBudgetCommand) -> DomainResult<CreateBudgetResult> {
        let name = command.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("budget name cannot be empty"));
        }
        if command.total_amount <= 0.0 {
            return Err(DomainError::validation("budget total must be positive"));
        }
        let start = parse_date(&command.start_date)?;
        let end = parse_date(&command.end_date)?;
        if end < start {
            return Err(DomainError::validation(
                "budget end date cannot be before its start date",
            ));
        }

        let member = require_membership(
            self.family_repository.as_ref(),
            &command.family_id,
            &command.requestor.user_id,
        )
        .await?;
        require_capability(&member, Capability::EditBudget)?;

        let budget = FamilyBudget {
            id: FamilyBudget::generate_id(),
            family_id: command.family_id.clone(),
            name,
            total_amount: command.total_amount,
            spent_amount: 0.0,
            period_type: command.period_type,
            start_date: command.start_date.clone(),
            end_date: command.end_date.clone(),
            created_by: command.requestor.user_id.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.budget_repository.store_budget(&budget).await?;

        info!("Created budget {} in family {}", budget.id, budget.family_id);

        Ok(CreateBudgetResult {
            budget,
            success_message: "Budget created successfully".to_string(),
        })
    }

    /// A family's budgets. Plain membership suffices; budgets are visible
    /// to every member while edits stay gated.
    pub async fn get_family_budgets(
        &self,
        requestor: &Requestor,
        family_id: &str,
    ) -> DomainResult<Vec<FamilyBudget>> {
        require_membership(self.family_repository.as_ref(), family_id, &requestor.user_id)
            .await?;

        Ok(self.budget_repository.list_for_family(family_id).await?)
    }

    /// Expenses linked to a budget, newest spend first.
    pub async fn get_budget_expenses(
        &self,
        requestor: &Requestor,
        budget_id: &str,
    ) -> DomainResult<Vec<FamilyExpense>> {
        let budget = self
            .budget_repository
            .get_budget(budget_id)
            .await?
            .ok_or_else(|| DomainError::not_found("budget not found"))?;
        let member = require_membership(
            self.family_repository.as_ref(),
            &budget.family_id,
            &requestor.user_id,
        )
        .await?;
        require_capability(&member, Capability::ViewBudget)?;

        Ok(self.budget_repository.list_expenses_for_budget(budget_id).await?)
    }

    /// Record an expense, optionally linked to a budget and/or a list.
    pub async fn record_expense(&self, command: RecordExpenseCommand) -> DomainResult<RecordExpenseResult> {
        let description = command.description.trim().to_string();
        if description.is_empty() {
            return Err(DomainError::validation("expense description cannot be empty"));
        }
        if command.amount <= 0.0 {
            return Err(DomainError::validation("expense amount must be positive"));
        }
        let category = command.category.trim().to_string();
        if category.is_empty() {
            return Err(DomainError::validation("expense category cannot be empty"));
        }

        let member = require_membership(
            self.family_repository.as_ref(),
            &command.family_id,
            &command.requestor.user_id,
        )
        .await?;
        require_capability(&member, Capability::EditBudget)?;

        if let Some(budget_id) = &command.budget_id {
            let budget = self
                .budget_repository
                .get_budget(budget_id)
                .await?
                .ok_or_else(|| DomainError::not_found("budget not found"))?;
            if budget.family_id != command.family_id {
                return Err(DomainError::not_found("budget not found in this family"));
            }
        }
        if let Some(list_id) = &command.list_id {
            let list = self
                .list_repository
                .get_list(list_id)
                .await?
                .ok_or_else(|| DomainError::not_found("shopping list not found"))?;
            if list.family_id != command.family_id {
                return Err(DomainError::not_found(
                    "shopping list not found in this family",
                ));
            }
        }

        let now = Utc::now().to_rfc3339();
        let expense = FamilyExpense {
            id: FamilyExpense::generate_id(),
            family_id: command.family_id.clone(),
            budget_id: command.budget_id.clone(),
            list_id: command.list_id.clone(),
            description,
            amount: command.amount,
            category,
            paid_by: command.requestor.user_id.clone(),
            expense_date: command.expense_date.clone().unwrap_or_else(|| now.clone()),
            created_at: now,
        };
        self.budget_repository.store_expense(&expense).await?;

        if let Some(budget_id) = &expense.budget_id {
            self.budget_repository.recompute_spent_amount(budget_id).await?;
        }

        info!(
            "Recorded expense {} ({:.2}) in family {}",
            expense.id, expense.amount, expense.family_id
        );

        Ok(RecordExpenseResult {
            expense,
            success_message: "Expense recorded successfully".to_string(),
        })
    }

    /// Edit an expense; the linked budget's total is re-derived afterwards.
    pub async fn update_expense(
        &self,
        requestor: &Requestor,
        expense_id: &str,
        changes: UpdateExpenseCommand,
    ) -> DomainResult<FamilyExpense> {
        let mut expense = self
            .budget_repository
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| DomainError::not_found("expense not found"))?;
        let member = require_membership(
            self.family_repository.as_ref(),
            &expense.family_id,
            &requestor.user_id,
        )
        .await?;
        require_capability(&member, Capability::EditBudget)?;

        if let Some(description) = changes.description {
            let description = description.trim().to_string();
            if description.is_empty() {
                return Err(DomainError::validation("expense description cannot be empty"));
            }
            expense.description = description;
        }
        if let Some(amount) = changes.amount {
            if amount <= 0.0 {
                return Err(DomainError::validation("expense amount must be positive"));
            }
            expense.amount = amount;
        }
        if let Some(category) = changes.category {
            let category = category.trim().to_string();
            if category.is_empty() {
                return Err(DomainError::validation("expense category cannot be empty"));
            }
            expense.category = category;
        }

        self.budget_repository.update_expense(&expense).await?;

        if let Some(budget_id) = &expense.budget_id {
            self.budget_repository.recompute_spent_amount(budget_id).await?;
        }

        Ok(expense)
    }

    /// Delete an expense; the linked budget's total is re-derived afterwards.
    pub async fn delete_expense(&self, requestor: &Requestor, expense_id: &str) -> DomainResult<()> {
        let expense = self
            .budget_repository
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| DomainError::not_found("expense not found"))?;
        let member = require_membership(
            self.family_repository.as_ref(),
            &expense.family_id,
            &requestor.user_id,
        )
        .await?;
        require_capability(&member, Capability::EditBudget)?;

        let deleted = self.budget_repository.delete_expense(expense_id).await?;
        if !deleted {
            return Err(DomainError::conflict("expense was deleted concurrently"));
        }

        if let Some(budget_id) = &expense.budget_id {
            self.budget_repository.recompute_spent_amount(budget_id).await?;
        }

        info!("Deleted expense {} from family {}", expense_id, expense.family_id);
        Ok(())
    }
}

fn parse_date(date: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| DomainError::validation(format!("'{date}' is not a YYYY-MM-DD date")))
}
