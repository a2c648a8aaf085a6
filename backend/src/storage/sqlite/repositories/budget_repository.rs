use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::sqlite::connection::DbConnection;
use crate::storage::traits::BudgetStorage;
use shared::{BudgetPeriod, FamilyBudget, FamilyExpense};

/// Repository for family budgets and expenses
#[derive(Clone)]
pub struct BudgetRepository {
    db: DbConnection,
}

impl BudgetRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn budget_from_row(row: &SqliteRow) -> Result<FamilyBudget> {
        let period_text: String = row.get("period_type");
        let period_type = BudgetPeriod::parse(&period_text)
            .ok_or_else(|| anyhow!("unknown budget period in storage: {}", period_text))?;

        Ok(FamilyBudget {
            id: row.get("id"),
            family_id: row.get("family_id"),
            name: row.get("name"),
            total_amount: row.get("total_amount"),
            spent_amount: row.get("spent_amount"),
            period_type,
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            created_by: row.get("created_by"),
            created_at: row.get("created_at"),
        })
    }

    fn expense_from_row(row: &SqliteRow) -> FamilyExpense {
        FamilyExpense {
            id: row.get("id"),
            family_id: row.get("family_id"),
            budget_id: row.get("budget_id"),
            list_id: row.get("list_id"),
            description: row.get("description"),
            amount: row.get("amount"),
            category: row.get("category"),
            paid_by: row.get("paid_by"),
            expense_date: row.get("expense_date"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl BudgetStorage for BudgetRepository {
    async fn store_budget(&self, budget: &FamilyBudget) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO family_budgets
                (id, family_id, name, total_amount, spent_amount, period_type,
                 start_date, end_date, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&budget.id)
        .bind(&budget.family_id)
        .bind(&budget.name)
        .bind(budget.total_amount)
        .bind(budget.spent_amount)
        .bind(budget.period_type.as_str())
        .bind(&budget.start_date)
        .bind(&budget.end_date)
        .bind(&budget.created_by)
        .bind(&budget.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn get_budget(&self, budget_id: &str) -> Result<Option<FamilyBudget>> {
        let row = sqlx::query(
            r#"
            SELECT id, family_id, name, total_amount, spent_amount, period_type,
                   start_date, end_date, created_by, created_at
            FROM family_budgets
            WHERE id = ?
            "#,
        )
        .bind(budget_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(Self::budget_from_row).transpose()
    }

    async fn list_for_family(&self, family_id: &str) -> Result<Vec<FamilyBudget>> {
        let rows = sqlx::query(
            r#"
            SELECT id, family_id, name, total_amount, spent_amount, period_type,
                   start_date, end_date, created_by, created_at
            FROM family_budgets
            WHERE family_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(family_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::budget_from_row).collect()
    }

    async fn store_expense(&self, expense: &FamilyExpense) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO family_expenses
                (id, family_id, budget_id, list_id, description, amount,
                 category, paid_by, expense_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.family_id)
        .bind(&expense.budget_id)
        .bind(&expense.list_id)
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(&expense.category)
        .bind(&expense.paid_by)
        .bind(&expense.expense_date)
        .bind(&expense.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn get_expense(&self, expense_id: &str) -> Result<Option<FamilyExpense>> {
        let row = sqlx::query(
            r#"
            SELECT id, family_id, budget_id, list_id, description, amount,
                   category, paid_by, expense_date, created_at
            FROM family_expenses
            WHERE id = ?
            "#,
        )
        .bind(expense_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(Self::expense_from_row))
    }

    async fn list_expenses_for_budget(&self, budget_id: &str) -> Result<Vec<FamilyExpense>> {
        let rows = sqlx::query(
            r#"
            SELECT id, family_id, budget_id, list_id, description, amount,
                   category, paid_by, expense_date, created_at
            FROM family_expenses
            WHERE budget_id = ?
            ORDER BY expense_date DESC
            "#,
        )
        .bind(budget_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(Self::expense_from_row).collect())
    }

    async fn update_expense(&self, expense: &FamilyExpense) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE family_expenses
            SET description = ?, amount = ?, category = ?
            WHERE id = ?
            "#,
        )
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(&expense.category)
        .bind(&expense.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn delete_expense(&self, expense_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM family_expenses WHERE id = ?")
            .bind(expense_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn recompute_spent_amount(&self, budget_id: &str) -> Result<()> {
        // Re-derived from the full expense set, never incremented, so
        // concurrent edits and corrections cannot drift the total.
        sqlx::query(
            r#"
            UPDATE family_budgets
            SET spent_amount = (
                SELECT COALESCE(SUM(amount), 0)
                FROM family_expenses
                WHERE budget_id = ?
            )
            WHERE id = ?
            "#,
        )
        .bind(budget_id)
        .bind(budget_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}
