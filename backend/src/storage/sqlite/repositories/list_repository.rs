use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::sqlite::connection::DbConnection;
use crate::storage::traits::ListStorage;
use shared::{ItemPriority, ListStatus, SharedListItem, SharedShoppingList};

/// Repository for shared shopping lists and their items
#[derive(Clone)]
pub struct ListRepository {
    db: DbConnection,
}

impl ListRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn list_from_row(row: &SqliteRow) -> Result<SharedShoppingList> {
        let status_text: String = row.get("status");
        let status = ListStatus::parse(&status_text)
            .ok_or_else(|| anyhow!("unknown list status in storage: {}", status_text))?;

        Ok(SharedShoppingList {
            id: row.get("id"),
            family_id: row.get("family_id"),
            name: row.get("name"),
            created_by: row.get("created_by"),
            budget_amount: row.get("budget_amount"),
            status,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn item_from_row(row: &SqliteRow) -> Result<SharedListItem> {
        let priority_text: String = row.get("priority");
        let priority = ItemPriority::parse(&priority_text)
            .ok_or_else(|| anyhow!("unknown item priority in storage: {}", priority_text))?;

        Ok(SharedListItem {
            id: row.get("id"),
            list_id: row.get("list_id"),
            name: row.get("name"),
            quantity: row.get::<i64, _>("quantity") as u32,
            estimated_price: row.get("estimated_price"),
            actual_price: row.get("actual_price"),
            priority,
            completed: row.get("completed"),
            completed_by: row.get("completed_by"),
            completed_at: row.get("completed_at"),
            added_by: row.get("added_by"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl ListStorage for ListRepository {
    async fn store_list(&self, list: &SharedShoppingList) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shopping_lists
                (id, family_id, name, created_by, budget_amount, status,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&list.id)
        .bind(&list.family_id)
        .bind(&list.name)
        .bind(&list.created_by)
        .bind(list.budget_amount)
        .bind(list.status.as_str())
        .bind(&list.created_at)
        .bind(&list.updated_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn get_list(&self, list_id: &str) -> Result<Option<SharedShoppingList>> {
        let row = sqlx::query(
            r#"
            SELECT id, family_id, name, created_by, budget_amount, status,
                   created_at, updated_at
            FROM shopping_lists
            WHERE id = ?
            "#,
        )
        .bind(list_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(Self::list_from_row).transpose()
    }

    async fn list_for_family(&self, family_id: &str) -> Result<Vec<SharedShoppingList>> {
        let rows = sqlx::query(
            r#"
            SELECT id, family_id, name, created_by, budget_amount, status,
                   created_at, updated_at
            FROM shopping_lists
            WHERE family_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(family_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::list_from_row).collect()
    }

    async fn update_list_status(
        &self,
        list_id: &str,
        status: ListStatus,
        updated_at: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE shopping_lists
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(updated_at)
        .bind(list_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_list(&self, list_id: &str) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM list_items WHERE list_id = ?")
            .bind(list_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM shopping_lists WHERE id = ?")
            .bind(list_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn store_item(&self, item: &SharedListItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO list_items
                (id, list_id, name, quantity, estimated_price, actual_price,
                 priority, completed, completed_by, completed_at, added_by,
                 created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.list_id)
        .bind(&item.name)
        .bind(item.quantity as i64)
        .bind(item.estimated_price)
        .bind(item.actual_price)
        .bind(item.priority.as_str())
        .bind(item.completed)
        .bind(&item.completed_by)
        .bind(&item.completed_at)
        .bind(&item.added_by)
        .bind(&item.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<SharedListItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, list_id, name, quantity, estimated_price, actual_price,
                   priority, completed, completed_by, completed_at, added_by,
                   created_at
            FROM list_items
            WHERE id = ?
            "#,
        )
        .bind(item_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(Self::item_from_row).transpose()
    }

    async fn list_items(&self, list_id: &str) -> Result<Vec<SharedListItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, list_id, name, quantity, estimated_price, actual_price,
                   priority, completed, completed_by, completed_at, added_by,
                   created_at
            FROM list_items
            WHERE list_id = ?
            ORDER BY completed ASC,
                     CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END,
                     created_at ASC
            "#,
        )
        .bind(list_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::item_from_row).collect()
    }

    async fn update_item(&self, item: &SharedListItem) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE list_items
            SET name = ?, quantity = ?, estimated_price = ?, actual_price = ?,
                priority = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.name)
        .bind(item.quantity as i64)
        .bind(item.estimated_price)
        .bind(item.actual_price)
        .bind(item.priority.as_str())
        .bind(&item.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn set_item_completion(
        &self,
        item_id: &str,
        completion: Option<(&str, &str)>,
    ) -> Result<bool> {
        // One statement writes the whole triple; partial states cannot occur.
        let (completed, completed_by, completed_at) = match completion {
            Some((user_id, at)) => (true, Some(user_id), Some(at)),
            None => (false, None, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE list_items
            SET completed = ?, completed_by = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(completed)
        .bind(completed_by)
        .bind(completed_at)
        .bind(item_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_item(&self, item_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM list_items WHERE id = ?")
            .bind(item_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
