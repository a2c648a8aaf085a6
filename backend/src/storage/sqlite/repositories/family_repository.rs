use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::sqlite::connection::DbConnection;
use crate::storage::traits::FamilyStorage;
use shared::{Family, FamilyMember, FamilyRole, MemberPermissions};

/// Repository for family and membership rows
#[derive(Clone)]
pub struct FamilyRepository {
    db: DbConnection,
}

impl FamilyRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn family_from_row(row: &SqliteRow) -> Family {
        Family {
            id: row.get("id"),
            name: row.get("name"),
            created_by: row.get("created_by"),
            created_at: row.get("created_at"),
        }
    }

    fn member_from_row(row: &SqliteRow) -> Result<FamilyMember> {
        let role_text: String = row.get("role");
        let role = FamilyRole::parse(&role_text)
            .ok_or_else(|| anyhow!("unknown role in storage: {}", role_text))?;

        Ok(FamilyMember {
            id: row.get("id"),
            family_id: row.get("family_id"),
            user_id: row.get("user_id"),
            email: row.get("email"),
            role,
            permissions: MemberPermissions {
                view_lists: row.get("view_lists"),
                edit_lists: row.get("edit_lists"),
                create_lists: row.get("create_lists"),
                view_budget: row.get("view_budget"),
                edit_budget: row.get("edit_budget"),
            },
            joined_at: row.get("joined_at"),
        })
    }
}

#[async_trait]
impl FamilyStorage for FamilyRepository {
    async fn create_family_with_admin(&self, family: &Family, admin: &FamilyMember) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO families (id, name, created_by, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&family.id)
        .bind(&family.name)
        .bind(&family.created_by)
        .bind(&family.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO family_members
                (id, family_id, user_id, email, role,
                 view_lists, edit_lists, create_lists, view_budget, edit_budget,
                 joined_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&admin.id)
        .bind(&admin.family_id)
        .bind(&admin.user_id)
        .bind(&admin.email)
        .bind(admin.role.as_str())
        .bind(admin.permissions.view_lists)
        .bind(admin.permissions.edit_lists)
        .bind(admin.permissions.create_lists)
        .bind(admin.permissions.view_budget)
        .bind(admin.permissions.edit_budget)
        .bind(&admin.joined_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_family(&self, family_id: &str) -> Result<Option<Family>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, created_by, created_at
            FROM families
            WHERE id = ?
            "#,
        )
        .bind(family_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(Self::family_from_row))
    }

    async fn get_member(&self, family_id: &str, user_id: &str) -> Result<Option<FamilyMember>> {
        let row = sqlx::query(
            r#"
            SELECT id, family_id, user_id, email, role,
                   view_lists, edit_lists, create_lists, view_budget, edit_budget,
                   joined_at
            FROM family_members
            WHERE family_id = ? AND user_id = ?
            "#,
        )
        .bind(family_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(Self::member_from_row).transpose()
    }

    async fn get_membership_for_user(&self, user_id: &str) -> Result<Option<FamilyMember>> {
        let row = sqlx::query(
            r#"
            SELECT id, family_id, user_id, email, role,
                   view_lists, edit_lists, create_lists, view_budget, edit_budget,
                   joined_at
            FROM family_members
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(Self::member_from_row).transpose()
    }

    async fn list_members(&self, family_id: &str) -> Result<Vec<FamilyMember>> {
        let rows = sqlx::query(
            r#"
            SELECT id, family_id, user_id, email, role,
                   view_lists, edit_lists, create_lists, view_budget, edit_budget,
                   joined_at
            FROM family_members
            WHERE family_id = ?
            ORDER BY CASE role WHEN 'admin' THEN 0 ELSE 1 END, joined_at ASC
            "#,
        )
        .bind(family_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::member_from_row).collect()
    }

    async fn count_admins_excluding(
        &self,
        family_id: &str,
        excluded_user_id: &str,
    ) -> Result<u32> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS admin_count
            FROM family_members
            WHERE family_id = ? AND role = 'admin' AND user_id != ?
            "#,
        )
        .bind(family_id)
        .bind(excluded_user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(row.get::<i64, _>("admin_count") as u32)
    }

    async fn store_member(&self, member: &FamilyMember) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO family_members
                (id, family_id, user_id, email, role,
                 view_lists, edit_lists, create_lists, view_budget, edit_budget,
                 joined_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&member.id)
        .bind(&member.family_id)
        .bind(&member.user_id)
        .bind(&member.email)
        .bind(member.role.as_str())
        .bind(member.permissions.view_lists)
        .bind(member.permissions.edit_lists)
        .bind(member.permissions.create_lists)
        .bind(member.permissions.view_budget)
        .bind(member.permissions.edit_budget)
        .bind(&member.joined_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn update_member_role(
        &self,
        family_id: &str,
        user_id: &str,
        role: FamilyRole,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE family_members
            SET role = ?
            WHERE family_id = ? AND user_id = ?
            "#,
        )
        .bind(role.as_str())
        .bind(family_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_member_permissions(
        &self,
        family_id: &str,
        user_id: &str,
        permissions: &MemberPermissions,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE family_members
            SET view_lists = ?, edit_lists = ?, create_lists = ?,
                view_budget = ?, edit_budget = ?
            WHERE family_id = ? AND user_id = ?
            "#,
        )
        .bind(permissions.view_lists)
        .bind(permissions.edit_lists)
        .bind(permissions.create_lists)
        .bind(permissions.view_budget)
        .bind(permissions.edit_budget)
        .bind(family_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_member(&self, family_id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM family_members
            WHERE family_id = ? AND user_id = ?
            "#,
        )
        .bind(family_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_family(&self, family_id: &str) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM family_expenses WHERE family_id = ?")
            .bind(family_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM family_budgets WHERE family_id = ?")
            .bind(family_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            DELETE FROM list_items
            WHERE list_id IN (SELECT id FROM shopping_lists WHERE family_id = ?)
            "#,
        )
        .bind(family_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM shopping_lists WHERE family_id = ?")
            .bind(family_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM invitations WHERE family_id = ?")
            .bind(family_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM family_members WHERE family_id = ?")
            .bind(family_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM families WHERE id = ?")
            .bind(family_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
