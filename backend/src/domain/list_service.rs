//! Gateway over shared shopping lists and their items.
//!
//! Every operation resolves the caller's membership in the owning family
//! first, then the per-member flag the operation needs. Authorization
//! failures are surfaced as such, never downgraded to empty results.

use chrono::Utc;
use log::info;
use std::sync::Arc;

use crate::domain::authorization::{require_admin, require_capability, require_membership, Capability};
use crate::domain::commands::lists::{
    AddItemCommand, CompleteItemCommand, CreateListCommand, CreateListResult, UpdateItemCommand,
    UpdateListStatusCommand,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::sqlite::repositories::{FamilyRepository, ListRepository};
use crate::storage::sqlite::DbConnection;
use crate::storage::{FamilyStorage, ListStorage};
use shared::{FamilyMember, ListStatus, Requestor, SharedListItem, SharedShoppingList};

/// Service for shared shopping lists and list items
#[derive(Clone)]
pub struct ListService {
    list_repository: Arc<dyn ListStorage>,
    family_repository: Arc<dyn FamilyStorage>,
}

impl ListService {
    /// Create a new ListService backed by SQLite
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            list_repository: Arc::new(ListRepository::new((*db).clone())),
            family_repository: Arc::new(FamilyRepository::new((*db).clone())),
        }
    }

    /// Create a shared list for a family.
    pub async fn create_list(&self, command: CreateListCommand) -> DomainResult<CreateListResult> {
        let name = command.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("list name cannot be empty"));
        }
        if let Some(budget) = command.budget_amount {
            if budget < 0.0 {
                return Err(DomainError::validation("list budget cannot be negative"));
            }
        }

        let member = require_membership(
            self.family_repository.as_ref(),
            &command.family_id,
            &command.requestor.user_id,
        )
        .await?;
        require_capability(&member, Capability::CreateLists)?;

        let now = Utc::now().to_rfc3339();
        let list = SharedShoppingList {
            id: SharedShoppingList::generate_id(),
            family_id: command.family_id.clone(),
            name,
            created_by: command.requestor.user_id.clone(),
            budget_amount: command.budget_amount,
            status: ListStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        };
        self.list_repository.store_list(&list).await?;

        info!("Created list {} in family {}", list.id, list.family_id);

        Ok(CreateListResult {
            list,
            success_message: "Shopping list created successfully".to_string(),
        })
    }

    /// A family's lists, visible to members holding the view flag.
    pub async fn get_family_lists(
        &self,
        requestor: &Requestor,
        family_id: &str,
    ) -> DomainResult<Vec<SharedShoppingList>> {
        let member =
            require_membership(self.family_repository.as_ref(), family_id, &requestor.user_id)
                .await?;
        require_capability(&member, Capability::ViewLists)?;

        Ok(self.list_repository.list_for_family(family_id).await?)
    }

    /// Items on a list, incomplete first.
    pub async fn get_list_items(
        &self,
        requestor: &Requestor,
        list_id: &str,
    ) -> DomainResult<Vec<SharedListItem>> {
        let (list, member) = self.load_list_for(requestor, list_id).await?;
        require_capability(&member, Capability::ViewLists)?;

        Ok(self.list_repository.list_items(&list.id).await?)
    }

    /// Move a list through its lifecycle (active, completed, archived).
    pub async fn update_list_status(&self, command: UpdateListStatusCommand) -> DomainResult<()> {
        let (list, member) = self.load_list_for(&command.requestor, &command.list_id).await?;
        require_capability(&member, Capability::EditLists)?;

        let updated = self
            .list_repository
            .update_list_status(&list.id, command.status, &Utc::now().to_rfc3339())
            .await?;
        if !updated {
            return Err(DomainError::conflict("list was deleted concurrently"));
        }

        info!("List {} status set to {}", list.id, command.status.as_str());
        Ok(())
    }

    /// Delete a list and its items. Only the creator or an admin may.
    pub async fn delete_list(&self, requestor: &Requestor, list_id: &str) -> DomainResult<()> {
        let (list, member) = self.load_list_for(requestor, list_id).await?;

        if list.created_by != requestor.user_id && require_admin(&member, "delete this list").is_err()
        {
            return Err(DomainError::authorization(
                "only the list creator or an admin can delete a list",
            ));
        }

        let deleted = self.list_repository.delete_list(&list.id).await?;
        if !deleted {
            return Err(DomainError::conflict("list was deleted concurrently"));
        }

        info!("Deleted list {} from family {}", list.id, list.family_id);
        Ok(())
    }

    /// Add an item to a list.
    pub async fn add_item(&self, command: AddItemCommand) -> DomainResult<SharedListItem> {
        let name = command.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if command.quantity == 0 {
            return Err(DomainError::validation("item quantity must be at least 1"));
        }
        if matches!(command.estimated_price, Some(p) if p < 0.0) {
            return Err(DomainError::validation("item price cannot be negative"));
        }

        let (list, member) = self.load_list_for(&command.requestor, &command.list_id).await?;
        require_capability(&member, Capability::EditLists)?;

        let item = SharedListItem {
            id: SharedListItem::generate_id(),
            list_id: list.id.clone(),
            name,
            quantity: command.quantity,
            estimated_price: command.estimated_price,
            actual_price: None,
            priority: command.priority,
            completed: false,
            completed_by: None,
            completed_at: None,
            added_by: command.requestor.user_id.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.list_repository.store_item(&item).await?;

        info!("Added item {} to list {}", item.id, list.id);
        Ok(item)
    }

    /// Edit an item's fields; `None` fields are left untouched.
    pub async fn update_item(
        &self,
        requestor: &Requestor,
        item_id: &str,
        changes: UpdateItemCommand,
    ) -> DomainResult<SharedListItem> {
        let mut item = self
            .list_repository
            .get_item(item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("item not found"))?;
        let (_, member) = self.load_list_for(requestor, &item.list_id).await?;
        require_capability(&member, Capability::EditLists)?;

        if let Some(name) = changes.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(DomainError::validation("item name cannot be empty"));
            }
            item.name = name;
        }
        if let Some(quantity) = changes.quantity {
            if quantity == 0 {
                return Err(DomainError::validation("item quantity must be at least 1"));
            }
            item.quantity = quantity;
        }
        if let Some(price) = changes.estimated_price {
            if price < 0.0 {
                return Err(DomainError::validation("item price cannot be negative"));
            }
            item.estimated_price = Some(price);
        }
        if let Some(price) = changes.actual_price {
            if price < 0.0 {
                return Err(DomainError::validation("item price cannot be negative"));
            }
            item.actual_price = Some(price);
        }
        if let Some(priority) = changes.priority {
            item.priority = priority;
        }

        self.list_repository.update_item(&item).await?;
        Ok(item)
    }

    /// Check an item off, or back on.
    ///
    /// The completion triple is written atomically: checking off records
    /// who and when alongside the flag; checking back on clears all three.
    /// Re-completing a completed item conflicts rather than silently
    /// re-attributing the completion.
    pub async fn complete_item(&self, command: CompleteItemCommand) -> DomainResult<()> {
        let item = self
            .list_repository
            .get_item(&command.item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("item not found"))?;
        let (_, member) = self.load_list_for(&command.requestor, &item.list_id).await?;
        require_capability(&member, Capability::EditLists)?;

        if item.completed == command.completed {
            return Err(DomainError::conflict(if item.completed {
                "item is already completed"
            } else {
                "item is not completed"
            }));
        }

        let now = Utc::now().to_rfc3339();
        let completion = if command.completed {
            Some((command.requestor.user_id.as_str(), now.as_str()))
        } else {
            None
        };

        let written = self
            .list_repository
            .set_item_completion(&command.item_id, completion)
            .await?;
        if !written {
            return Err(DomainError::conflict("item was deleted concurrently"));
        }

        info!(
            "Item {} marked {} by {}",
            command.item_id,
            if command.completed { "completed" } else { "incomplete" },
            command.requestor.user_id
        );
        Ok(())
    }

    /// Remove an item from its list.
    pub async fn remove_item(&self, requestor: &Requestor, item_id: &str) -> DomainResult<()> {
        let item = self
            .list_repository
            .get_item(item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("item not found"))?;
        let (_, member) = self.load_list_for(requestor, &item.list_id).await?;
        require_capability(&member, Capability::EditLists)?;

        let deleted = self.list_repository.delete_item(item_id).await?;
        if !deleted {
            return Err(DomainError::conflict("item was deleted concurrently"));
        }
        Ok(())
    }

    /// Resolve a list and the caller's membership in its owning family.
    async fn load_list_for(
        &self,
        requestor: &Requestor,
        list_id: &str,
    ) -> DomainResult<(SharedShoppingList, FamilyMember)> {
        let list = self
            .list_repository
            .get_list(list_id)
            .await?
            .ok_or_else(|| DomainError::not_found("shopping list not found"))?;
        let member = require_membership(
            self.family_repository.as_ref(),
            &list.family_id,
            &requestor.user_id,
        )
        .await?;
        Ok((list, member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commands::families::{CreateFamilyCommand, UpdateMemberPermissionsCommand};
    use crate::domain::family_service::FamilyService;
    use crate::domain::invitation_service::InvitationService;
    use crate::domain::commands::invitations::IssueInvitationCommand;
    use shared::{FamilyRole, ItemPriority, MemberPermissions};

    struct TestContext {
        lists: ListService,
        families: FamilyService,
        invitations: InvitationService,
    }

    async fn setup_test() -> TestContext {
        let db = Arc::new(
            DbConnection::init_test()
                .await
                .expect("Failed to create test database"),
        );
        TestContext {
            lists: ListService::new(db.clone()),
            families: FamilyService::new(db.clone()),
            invitations: InvitationService::new(db),
        }
    }

    fn requestor(n: &str) -> Requestor {
        Requestor::new(format!("user-{n}"), format!("{n}@example.com"))
    }

    /// Family with admin alice and member bob (joined via invitation).
    async fn family_of_two(ctx: &TestContext) -> (String, Requestor, Requestor) {
        let alice = requestor("alice");
        let bob = requestor("bob");
        let family_id = ctx
            .families
            .create_family(CreateFamilyCommand {
                requestor: alice.clone(),
                name: "Smiths".to_string(),
            })
            .await
            .unwrap()
            .family
            .id;
        let issued = ctx
            .invitations
            .issue(IssueInvitationCommand {
                requestor: alice.clone(),
                family_id: family_id.clone(),
                email: bob.email.clone(),
                role: FamilyRole::Member,
                message: None,
            })
            .await
            .unwrap();
        ctx.invitations.accept(&issued.invitation.id, &bob).await.unwrap();
        (family_id, alice, bob)
    }

    async fn create_list(ctx: &TestContext, family_id: &str, who: &Requestor) -> String {
        ctx.lists
            .create_list(CreateListCommand {
                requestor: who.clone(),
                family_id: family_id.to_string(),
                name: "Weekly shop".to_string(),
                budget_amount: Some(450.0),
            })
            .await
            .expect("Failed to create list")
            .list
            .id
    }

    fn add_item_command(who: &Requestor, list_id: &str, name: &str) -> AddItemCommand {
        AddItemCommand {
            requestor: who.clone(),
            list_id: list_id.to_string(),
            name: name.to_string(),
            quantity: 2,
            estimated_price: Some(32.99),
            priority: ItemPriority::Medium,
        }
    }

    #[tokio::test]
    async fn test_member_creates_list_and_adds_items() {
        let ctx = setup_test().await;
        let (family_id, _alice, bob) = family_of_two(&ctx).await;

        let list_id = create_list(&ctx, &family_id, &bob).await;
        let item = ctx
            .lists
            .add_item(add_item_command(&bob, &list_id, "Milk"))
            .await
            .expect("Add item should succeed");
        assert_eq!(item.name, "Milk");
        assert!(!item.completed);

        let items = ctx.lists.get_list_items(&bob, &list_id).await.unwrap();
        assert_eq!(items.len(), 1);

        let lists = ctx.lists.get_family_lists(&bob, &family_id).await.unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].status, ListStatus::Active);
    }

    #[tokio::test]
    async fn test_non_member_is_rejected() {
        let ctx = setup_test().await;
        let (family_id, alice, _bob) = family_of_two(&ctx).await;
        let outsider = requestor("mallory");

        let result = ctx.lists.get_family_lists(&outsider, &family_id).await;
        assert!(matches!(result, Err(DomainError::Authorization(_))));

        let list_id = create_list(&ctx, &family_id, &alice).await;
        let result = ctx
            .lists
            .add_item(add_item_command(&outsider, &list_id, "Milk"))
            .await;
        assert!(matches!(result, Err(DomainError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_revoked_create_flag_blocks_creation() {
        let ctx = setup_test().await;
        let (family_id, alice, bob) = family_of_two(&ctx).await;

        let mut perms = MemberPermissions::member_defaults();
        perms.create_lists = false;
        ctx.families
            .update_member_permissions(UpdateMemberPermissionsCommand {
                requestor: alice.clone(),
                family_id: family_id.clone(),
                target_user_id: bob.user_id.clone(),
                permissions: perms,
            })
            .await
            .unwrap();

        let result = ctx
            .lists
            .create_list(CreateListCommand {
                requestor: bob.clone(),
                family_id: family_id.clone(),
                name: "Weekly shop".to_string(),
                budget_amount: None,
            })
            .await;
        assert!(matches!(result, Err(DomainError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_add_item_validation() {
        let ctx = setup_test().await;
        let (family_id, alice, _bob) = family_of_two(&ctx).await;
        let list_id = create_list(&ctx, &family_id, &alice).await;

        let mut command = add_item_command(&alice, &list_id, "  ");
        let result = ctx.lists.add_item(command.clone()).await;
        assert!(matches!(result, Err(DomainError::Validation(_))));

        command.name = "Milk".to_string();
        command.quantity = 0;
        let result = ctx.lists.add_item(command.clone()).await;
        assert!(matches!(result, Err(DomainError::Validation(_))));

        command.quantity = 1;
        command.estimated_price = Some(-1.0);
        let result = ctx.lists.add_item(command).await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_completion_triple_is_all_or_nothing() {
        let ctx = setup_test().await;
        let (family_id, alice, bob) = family_of_two(&ctx).await;
        let list_id = create_list(&ctx, &family_id, &alice).await;
        let item = ctx
            .lists
            .add_item(add_item_command(&alice, &list_id, "Milk"))
            .await
            .unwrap();

        ctx.lists
            .complete_item(CompleteItemCommand {
                requestor: bob.clone(),
                item_id: item.id.clone(),
                completed: true,
            })
            .await
            .expect("Complete should succeed");

        let items = ctx.lists.get_list_items(&bob, &list_id).await.unwrap();
        let completed = &items[0];
        assert!(completed.completed);
        assert_eq!(completed.completed_by.as_deref(), Some(bob.user_id.as_str()));
        assert!(completed.completed_at.is_some());

        // Re-completing conflicts instead of re-attributing
        let result = ctx
            .lists
            .complete_item(CompleteItemCommand {
                requestor: alice.clone(),
                item_id: item.id.clone(),
                completed: true,
            })
            .await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));

        // Unchecking clears the whole triple
        ctx.lists
            .complete_item(CompleteItemCommand {
                requestor: alice.clone(),
                item_id: item.id.clone(),
                completed: false,
            })
            .await
            .expect("Uncomplete should succeed");

        let items = ctx.lists.get_list_items(&bob, &list_id).await.unwrap();
        let cleared = &items[0];
        assert!(!cleared.completed);
        assert!(cleared.completed_by.is_none());
        assert!(cleared.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_update_item_fields() {
        let ctx = setup_test().await;
        let (family_id, alice, _bob) = family_of_two(&ctx).await;
        let list_id = create_list(&ctx, &family_id, &alice).await;
        let item = ctx
            .lists
            .add_item(add_item_command(&alice, &list_id, "Milk"))
            .await
            .unwrap();

        let updated = ctx
            .lists
            .update_item(
                &alice,
                &item.id,
                UpdateItemCommand {
                    quantity: Some(3),
                    actual_price: Some(29.5),
                    priority: Some(ItemPriority::High),
                    ..Default::default()
                },
            )
            .await
            .expect("Update should succeed");
        assert_eq!(updated.quantity, 3);
        assert_eq!(updated.actual_price, Some(29.5));
        assert_eq!(updated.priority, ItemPriority::High);
        assert_eq!(updated.name, "Milk");
    }

    #[tokio::test]
    async fn test_delete_list_is_creator_or_admin_only() {
        let ctx = setup_test().await;
        let (family_id, alice, bob) = family_of_two(&ctx).await;

        // Alice (admin) may delete bob's list
        let list_id = create_list(&ctx, &family_id, &bob).await;
        ctx.lists
            .delete_list(&alice, &list_id)
            .await
            .expect("Admin delete should succeed");

        // Bob (plain member) may delete his own but not alice's
        let bobs = create_list(&ctx, &family_id, &bob).await;
        let alices = create_list(&ctx, &family_id, &alice).await;

        let result = ctx.lists.delete_list(&bob, &alices).await;
        assert!(matches!(result, Err(DomainError::Authorization(_))));

        ctx.lists
            .delete_list(&bob, &bobs)
            .await
            .expect("Creator delete should succeed");

        let result = ctx.lists.get_list_items(&bob, &bobs).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_status_lifecycle() {
        let ctx = setup_test().await;
        let (family_id, alice, _bob) = family_of_two(&ctx).await;
        let list_id = create_list(&ctx, &family_id, &alice).await;

        ctx.lists
            .update_list_status(UpdateListStatusCommand {
                requestor: alice.clone(),
                list_id: list_id.clone(),
                status: ListStatus::Completed,
            })
            .await
            .expect("Status update should succeed");

        let lists = ctx.lists.get_family_lists(&alice, &family_id).await.unwrap();
        assert_eq!(lists[0].status, ListStatus::Completed);
    }

    #[tokio::test]
    async fn test_missing_resources_are_not_found() {
        let ctx = setup_test().await;
        let (_family_id, alice, _bob) = family_of_two(&ctx).await;

        let result = ctx.lists.get_list_items(&alice, "list::nonexistent").await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));

        let result = ctx.lists.remove_item(&alice, "item::nonexistent").await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }
}
