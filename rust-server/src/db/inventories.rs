use super::{decode_error, Database};
use crate::card::{Card, EquipmentSlot};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const INVENTORY_COLUMNS: &str = "id, kind, user_id, group_id, name, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, inventory_id, card_id, quantity, notes, is_equipped, created_at, updated_at";

// ============================================================================
// Types
// ============================================================================

/// Who an inventory belongs to. Personal inventories are private to one user,
/// group inventories are shared by every member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryOwner {
    User(String),
    Group(String),
}

impl InventoryOwner {
    fn kind(&self) -> &'static str {
        match self {
            InventoryOwner::User(_) => "personal",
            InventoryOwner::Group(_) => "group",
        }
    }

    fn user_id(&self) -> Option<&str> {
        match self {
            InventoryOwner::User(id) => Some(id.as_str()),
            InventoryOwner::Group(_) => None,
        }
    }

    fn group_id(&self) -> Option<&str> {
        match self {
            InventoryOwner::User(_) => None,
            InventoryOwner::Group(id) => Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    pub id: String,
    pub owner: InventoryOwner,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<InventoryItem>,
}

/// Flat JSON shape: `type` plus whichever of `user_id` / `group_id` applies
impl Serialize for Inventory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            id: &'a str,
            #[serde(rename = "type")]
            kind: &'static str,
            user_id: Option<&'a str>,
            group_id: Option<&'a str>,
            name: &'a str,
            created_at: DateTime<Utc>,
            updated_at: DateTime<Utc>,
            items: &'a [InventoryItem],
        }

        Wire {
            id: &self.id,
            kind: self.owner.kind(),
            user_id: self.owner.user_id(),
            group_id: self.owner.group_id(),
            name: &self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: &self.items,
        }
        .serialize(serializer)
    }
}

/// A stack of one card held in an inventory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryItem {
    pub id: String,
    pub inventory_id: String,
    pub card_id: String,
    pub quantity: i64,
    pub notes: String,
    pub is_equipped: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub card: Option<Card>,
}

impl InventoryItem {
    pub fn slot(&self) -> Option<EquipmentSlot> {
        self.card.as_ref().and_then(|card| card.slot)
    }
}

/// Adding a card either opens a new stack or grows the existing one
#[derive(Debug)]
pub enum ItemAdded {
    Created(InventoryItem),
    Stacked(InventoryItem),
}

// ============================================================================
// Row Mapping
// ============================================================================

fn owner_from_row(row: &SqliteRow) -> Result<InventoryOwner, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    let user_id: Option<String> = row.try_get("user_id")?;
    let group_id: Option<String> = row.try_get("group_id")?;

    match (kind.as_str(), user_id, group_id) {
        ("personal", Some(user_id), _) => Ok(InventoryOwner::User(user_id)),
        ("group", _, Some(group_id)) => Ok(InventoryOwner::Group(group_id)),
        _ => Err(decode_error("kind", &kind)),
    }
}

fn inventory_from_row(row: &SqliteRow) -> Result<Inventory, sqlx::Error> {
    Ok(Inventory {
        id: row.try_get("id")?,
        owner: owner_from_row(row)?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &SqliteRow) -> Result<InventoryItem, sqlx::Error> {
    Ok(InventoryItem {
        id: row.try_get("id")?,
        inventory_id: row.try_get("inventory_id")?,
        card_id: row.try_get("card_id")?,
        quantity: row.try_get("quantity")?,
        notes: row.try_get("notes")?,
        is_equipped: row.try_get("is_equipped")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        card: None,
    })
}

// ============================================================================
// Queries
// ============================================================================

impl Database {
    pub async fn create_inventory(&self, owner: InventoryOwner, name: &str) -> Result<Inventory, sqlx::Error> {
        let now = Utc::now();
        let inventory = Inventory {
            id: uuid::Uuid::new_v4().to_string(),
            owner,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        };

        sqlx::query(
            "INSERT INTO inventories (id, kind, user_id, group_id, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&inventory.id)
        .bind(inventory.owner.kind())
        .bind(inventory.owner.user_id())
        .bind(inventory.owner.group_id())
        .bind(&inventory.name)
        .bind(inventory.created_at)
        .bind(inventory.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(inventory)
    }

    /// Owner of an inventory, for access checks that do not need the items
    pub async fn inventory_owner(&self, id: &str) -> Result<Option<InventoryOwner>, sqlx::Error> {
        let row = sqlx::query("SELECT kind, user_id, group_id FROM inventories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(owner_from_row).transpose()
    }

    pub async fn get_inventory(&self, id: &str) -> Result<Option<Inventory>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM inventories WHERE id = ?", INVENTORY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut inventory = inventory_from_row(&row)?;
        inventory.items = self.inventory_items(id).await?;
        Ok(Some(inventory))
    }

    /// Personal inventories of the user plus those of every group they are in
    pub async fn list_inventories_for_user(&self, user_id: &str) -> Result<Vec<Inventory>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM inventories \
             WHERE (kind = 'personal' AND user_id = ?) \
                OR (kind = 'group' AND group_id IN (SELECT group_id FROM group_members WHERE user_id = ?)) \
             ORDER BY created_at, id",
            INVENTORY_COLUMNS
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut inventories = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut inventory = inventory_from_row(row)?;
            inventory.items = self.inventory_items(&inventory.id).await?;
            inventories.push(inventory);
        }
        Ok(inventories)
    }

    async fn inventory_items(&self, inventory_id: &str) -> Result<Vec<InventoryItem>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM inventory_items WHERE inventory_id = ? ORDER BY created_at, id",
            ITEM_COLUMNS
        ))
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?;

        let mut items = rows.iter().map(item_from_row).collect::<Result<Vec<_>, _>>()?;
        self.attach_cards(&mut items).await?;
        Ok(items)
    }

    async fn attach_cards(&self, items: &mut [InventoryItem]) -> Result<(), sqlx::Error> {
        let ids: Vec<String> = items.iter().map(|item| item.card_id.clone()).collect();
        let mut cards = self.cards_by_ids(&ids).await?;
        for item in items.iter_mut() {
            item.card = cards.remove(&item.card_id);
        }
        Ok(())
    }

    pub async fn get_item(&self, item_id: &str) -> Result<Option<InventoryItem>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM inventory_items WHERE id = ?", ITEM_COLUMNS))
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut item = item_from_row(&row)?;
        self.attach_cards(std::slice::from_mut(&mut item)).await?;
        Ok(Some(item))
    }

    /// Put `quantity` of a card into the inventory, stacking onto an existing entry
    pub async fn add_item(
        &self,
        inventory_id: &str,
        card_id: &str,
        quantity: i64,
        notes: &str,
    ) -> Result<ItemAdded, sqlx::Error> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM inventory_items WHERE inventory_id = ? AND card_id = ?")
                .bind(inventory_id)
                .bind(card_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (item_id, created) = match existing {
            Some(id) => {
                sqlx::query("UPDATE inventory_items SET quantity = quantity + ?, updated_at = ? WHERE id = ?")
                    .bind(quantity)
                    .bind(now)
                    .bind(&id)
                    .execute(&mut *tx)
                    .await?;
                (id, false)
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                sqlx::query(
                    "INSERT INTO inventory_items (id, inventory_id, card_id, quantity, notes, is_equipped, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
                )
                .bind(&id)
                .bind(inventory_id)
                .bind(card_id)
                .bind(quantity)
                .bind(notes)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                (id, true)
            }
        };
        tx.commit().await?;

        let item = self.get_item(&item_id).await?.ok_or(sqlx::Error::RowNotFound)?;
        Ok(if created {
            ItemAdded::Created(item)
        } else {
            ItemAdded::Stacked(item)
        })
    }

    /// Overwrite quantity and notes. Returns false when the item does not exist.
    pub async fn update_item(&self, item_id: &str, quantity: i64, notes: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE inventory_items SET quantity = ?, notes = ?, updated_at = ? WHERE id = ?")
            .bind(quantity)
            .bind(notes)
            .bind(Utc::now())
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_item(&self, item_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM inventory_items WHERE id = ?")
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Equip or unequip an item. Equipping clears any other equipped item of the
    /// same slot in the same inventory.
    pub async fn set_equipped(&self, item: &InventoryItem, equipped: bool) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if let Some(slot) = item.slot().filter(|_| equipped) {
            let cleared = sqlx::query(
                "UPDATE inventory_items SET is_equipped = 0, updated_at = ? \
                 WHERE inventory_id = ? AND id != ? AND is_equipped = 1 \
                   AND card_id IN (SELECT id FROM cards WHERE slot = ?)",
            )
            .bind(now)
            .bind(&item.inventory_id)
            .bind(&item.id)
            .bind(slot.as_str())
            .execute(&mut *tx)
            .await?;

            if cleared.rows_affected() > 0 {
                tracing::debug!(
                    "Unequipped {} item(s) in slot {} of inventory {}",
                    cleared.rows_affected(),
                    slot.as_str(),
                    item.inventory_id
                );
            }
        }

        sqlx::query("UPDATE inventory_items SET is_equipped = ?, updated_at = ? WHERE id = ?")
            .bind(equipped)
            .bind(now)
            .bind(&item.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CreateCardRequest;
    use crate::db::test_support::temp_database;

    async fn user(db: &Database, name: &str) -> String {
        db.create_user(name, &format!("{}@example.com", name), "secret123", name)
            .await
            .unwrap()
            .id
    }

    async fn card(db: &Database, json: serde_json::Value) -> Card {
        let req: CreateCardRequest = serde_json::from_value(json).unwrap();
        let number = db.next_card_number().await.unwrap();
        let card = Card::from_request(uuid::Uuid::new_v4().to_string(), number, req, Utc::now());
        db.insert_card(&card).await.unwrap();
        card
    }

    #[tokio::test]
    async fn test_add_item_stacks() {
        let (_dir, db) = temp_database().await;
        let owner = user(&db, "rogue").await;
        let rope = card(&db, serde_json::json!({"name": "Rope", "description": "Hemp", "rarity": "common"})).await;
        let bag = db
            .create_inventory(InventoryOwner::User(owner.clone()), "Backpack")
            .await
            .unwrap();

        let first = db.add_item(&bag.id, &rope.id, 2, "50 ft").await.unwrap();
        let ItemAdded::Created(first) = first else {
            panic!("expected a new stack");
        };
        assert_eq!(first.quantity, 2);
        assert_eq!(first.card.as_ref().map(|c| c.name.as_str()), Some("Rope"));

        let second = db.add_item(&bag.id, &rope.id, 3, "").await.unwrap();
        let ItemAdded::Stacked(second) = second else {
            panic!("expected the existing stack");
        };
        assert_eq!(second.id, first.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(second.notes, "50 ft");

        let loaded = db.get_inventory(&bag.id).await.unwrap().unwrap();
        assert_eq!(loaded.owner, InventoryOwner::User(owner));
        assert_eq!(loaded.items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_includes_group_inventories() {
        let (_dir, db) = temp_database().await;
        let dm = user(&db, "dungeonmaster").await;
        let player = user(&db, "rogue").await;
        let outsider = user(&db, "stranger").await;
        let group = db.create_group("Table", "", &dm).await.unwrap();
        db.join_group(&group.id, &player).await.unwrap();

        db.create_inventory(InventoryOwner::Group(group.id.clone()), "Party Loot")
            .await
            .unwrap();
        db.create_inventory(InventoryOwner::User(player.clone()), "Pockets")
            .await
            .unwrap();
        db.create_inventory(InventoryOwner::User(dm.clone()), "Screen")
            .await
            .unwrap();

        let names = |list: Vec<Inventory>| list.into_iter().map(|i| i.name).collect::<Vec<_>>();
        assert_eq!(
            names(db.list_inventories_for_user(&player).await.unwrap()),
            vec!["Party Loot", "Pockets"]
        );
        assert_eq!(
            names(db.list_inventories_for_user(&dm).await.unwrap()),
            vec!["Party Loot", "Screen"]
        );
        assert!(db.list_inventories_for_user(&outsider).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_equip_replaces_same_slot() {
        let (_dir, db) = temp_database().await;
        let owner = user(&db, "fighter").await;
        let bag = db
            .create_inventory(InventoryOwner::User(owner), "Gear")
            .await
            .unwrap();
        let helm = card(&db, serde_json::json!({"name": "Helm", "description": "x", "rarity": "common", "slot": "head"})).await;
        let hood = card(&db, serde_json::json!({"name": "Hood", "description": "x", "rarity": "common", "slot": "head"})).await;
        let boots = card(&db, serde_json::json!({"name": "Boots", "description": "x", "rarity": "common", "slot": "feet"})).await;

        let mut ids = Vec::new();
        for c in [&helm, &hood, &boots] {
            let ItemAdded::Created(item) = db.add_item(&bag.id, &c.id, 1, "").await.unwrap() else {
                panic!("expected a new stack");
            };
            ids.push(item.id);
        }

        for id in &ids {
            let item = db.get_item(id).await.unwrap().unwrap();
            db.set_equipped(&item, true).await.unwrap();
        }

        let equipped: Vec<bool> = {
            let mut flags = Vec::new();
            for id in &ids {
                flags.push(db.get_item(id).await.unwrap().unwrap().is_equipped);
            }
            flags
        };
        assert_eq!(equipped, vec![false, true, true]);

        let hood_item = db.get_item(&ids[1]).await.unwrap().unwrap();
        db.set_equipped(&hood_item, false).await.unwrap();
        assert!(!db.get_item(&ids[1]).await.unwrap().unwrap().is_equipped);
    }

    #[tokio::test]
    async fn test_update_and_delete_item() {
        let (_dir, db) = temp_database().await;
        let owner = user(&db, "wizard").await;
        let bag = db
            .create_inventory(InventoryOwner::User(owner), "Satchel")
            .await
            .unwrap();
        let scroll = card(&db, serde_json::json!({"name": "Scroll", "description": "x", "rarity": "rare"})).await;
        let ItemAdded::Created(item) = db.add_item(&bag.id, &scroll.id, 1, "").await.unwrap() else {
            panic!("expected a new stack");
        };

        assert!(db.update_item(&item.id, 0, "used").await.unwrap());
        let updated = db.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(updated.quantity, 0);
        assert_eq!(updated.notes, "used");
        assert!(!updated.is_equipped);

        // The card stays visible on held items after it leaves the catalog
        db.delete_card(&scroll.id).await.unwrap();
        assert!(db.get_item(&item.id).await.unwrap().unwrap().card.is_some());

        assert!(db.delete_item(&item.id).await.unwrap());
        assert!(!db.delete_item(&item.id).await.unwrap());
        assert!(!db.update_item(&item.id, 1, "").await.unwrap());
    }
}
