use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{json_body, parse_id, AppState};
use crate::auth::AuthUser;
use crate::db::{GroupRole, Inventory, InventoryItem, InventoryOwner, ItemAdded};
use crate::error::ApiError;

// ============================================================================
// HTTP Handlers - Inventories
// ============================================================================

const MAX_INVENTORY_NAME: usize = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryKind {
    Personal,
    Group,
}

#[derive(Deserialize)]
pub struct CreateInventoryRequest {
    #[serde(rename = "type")]
    kind: InventoryKind,
    group_id: Option<String>,
    name: String,
}

#[derive(Deserialize)]
pub struct AddItemRequest {
    card_id: String,
    quantity: i64,
    #[serde(default)]
    notes: String,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    quantity: i64,
    #[serde(default)]
    notes: String,
    is_equipped: Option<bool>,
}

#[derive(Deserialize)]
pub struct EquipItemRequest {
    is_equipped: bool,
}

fn inventory_not_found() -> ApiError {
    ApiError::NotFound("Inventory not found".to_string())
}

fn item_not_found() -> ApiError {
    ApiError::NotFound("Item not found".to_string())
}

/// Personal inventories belong to their owner; group ones to every member
async fn ensure_access(state: &AppState, owner: &InventoryOwner, auth: &AuthUser) -> Result<(), ApiError> {
    let allowed = match owner {
        InventoryOwner::User(user_id) => *user_id == auth.user_id,
        InventoryOwner::Group(group_id) => state.db.membership(group_id, &auth.user_id).await?.is_some(),
    };

    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden("You do not have access to this inventory".to_string()))
    }
}

/// Load an item and check the caller may touch its inventory
async fn accessible_item(state: &AppState, item_id: &str, auth: &AuthUser) -> Result<InventoryItem, ApiError> {
    let item_id = parse_id(item_id, "Invalid item id")?;
    let item = state.db.get_item(&item_id).await?.ok_or_else(item_not_found)?;
    let owner = state
        .db
        .inventory_owner(&item.inventory_id)
        .await?
        .ok_or_else(inventory_not_found)?;

    ensure_access(state, &owner, auth).await?;
    Ok(item)
}

/// Equip or unequip, refusing cards without an equipment slot
async fn apply_equip(state: &AppState, item: &InventoryItem, equipped: bool) -> Result<(), ApiError> {
    if equipped && item.slot().is_none() {
        return Err(ApiError::BadRequest("This item cannot be equipped".to_string()));
    }
    state.db.set_equipped(item, equipped).await?;
    Ok(())
}

async fn reload_item(state: &AppState, item_id: &str) -> Result<InventoryItem, ApiError> {
    state.db.get_item(item_id).await?.ok_or_else(item_not_found)
}

/// POST /api/inventories
pub async fn create_inventory(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateInventoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let req = json_body(payload)?;

    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > MAX_INVENTORY_NAME {
        return Err(ApiError::BadRequest(
            "Inventory name must be between 1 and 100 characters".to_string(),
        ));
    }

    let owner = match req.kind {
        InventoryKind::Personal => InventoryOwner::User(auth.user_id.clone()),
        InventoryKind::Group => {
            let group_id = req
                .group_id
                .as_deref()
                .ok_or_else(|| ApiError::BadRequest("group_id is required for a group inventory".to_string()))?;
            let group_id = parse_id(group_id, "Invalid group id")?;

            if state.db.get_group(&group_id).await?.is_none() {
                return Err(ApiError::NotFound("Group not found".to_string()));
            }
            if state.db.membership(&group_id, &auth.user_id).await? != Some(GroupRole::Dm) {
                return Err(ApiError::Forbidden(
                    "Only the DM can create a group inventory".to_string(),
                ));
            }
            InventoryOwner::Group(group_id)
        }
    };

    let inventory = state.db.create_inventory(owner, name).await?;

    info!("{} created inventory {} (id: {})", auth.username, inventory.name, inventory.id);
    Ok((StatusCode::CREATED, Json(inventory)))
}

/// GET /api/inventories - personal inventories plus those of the caller's groups
pub async fn list_inventories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Inventory>>, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    Ok(Json(state.db.list_inventories_for_user(&auth.user_id).await?))
}

/// GET /api/inventories/:id
pub async fn get_inventory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Inventory>, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let id = parse_id(&id, "Invalid inventory id")?;

    let inventory = state.db.get_inventory(&id).await?.ok_or_else(inventory_not_found)?;
    ensure_access(&state, &inventory.owner, &auth).await?;
    Ok(Json(inventory))
}

/// POST /api/inventories/:id/items - 201 for a new stack, 200 when stacked
pub async fn add_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let inventory_id = parse_id(&id, "Invalid inventory id")?;
    let req = json_body(payload)?;

    if req.quantity < 1 {
        return Err(ApiError::BadRequest("Quantity must be at least 1".to_string()));
    }
    let card_id = parse_id(&req.card_id, "Invalid card id")?;

    let owner = state
        .db
        .inventory_owner(&inventory_id)
        .await?
        .ok_or_else(inventory_not_found)?;
    ensure_access(&state, &owner, &auth).await?;

    let card = state
        .db
        .get_card(&card_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;

    let added = state
        .db
        .add_item(&inventory_id, &card.id, req.quantity, req.notes.trim())
        .await?;

    info!("{} added {} x{} to inventory {}", auth.username, card.card_number, req.quantity, inventory_id);
    Ok(match added {
        ItemAdded::Created(item) => (StatusCode::CREATED, Json(item)),
        ItemAdded::Stacked(item) => (StatusCode::OK, Json(item)),
    })
}

/// PUT /api/inventories/:id/items/:item_id
pub async fn update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, item_id)): Path<(String, String)>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<InventoryItem>, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let inventory_id = parse_id(&id, "Invalid inventory id")?;
    let req = json_body(payload)?;

    if req.quantity < 0 {
        return Err(ApiError::BadRequest("Quantity cannot be negative".to_string()));
    }

    let item = accessible_item(&state, &item_id, &auth).await?;
    if item.inventory_id != inventory_id {
        return Err(item_not_found());
    }

    if let Some(equipped) = req.is_equipped {
        apply_equip(&state, &item, equipped).await?;
    }
    if !state.db.update_item(&item.id, req.quantity, req.notes.trim()).await? {
        return Err(item_not_found());
    }

    info!("{} updated item {} in inventory {}", auth.username, item.id, inventory_id);
    reload_item(&state, &item.id).await.map(Json)
}

/// DELETE /api/inventories/:id/items/:item_id
pub async fn remove_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let inventory_id = parse_id(&id, "Invalid inventory id")?;

    let item = accessible_item(&state, &item_id, &auth).await?;
    if item.inventory_id != inventory_id || !state.db.delete_item(&item.id).await? {
        return Err(item_not_found());
    }

    info!("{} removed item {} from inventory {}", auth.username, item.id, inventory_id);
    Ok(Json(serde_json::json!({ "message": "Item removed from inventory" })))
}

/// PUT /api/inventories/items/:item_id/equip
pub async fn equip_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
    payload: Result<Json<EquipItemRequest>, JsonRejection>,
) -> Result<Json<InventoryItem>, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let req = json_body(payload)?;

    let item = accessible_item(&state, &item_id, &auth).await?;
    apply_equip(&state, &item, req.is_equipped).await?;

    info!(
        "{} {} item {}",
        auth.username,
        if req.is_equipped { "equipped" } else { "unequipped" },
        item.id
    );
    reload_item(&state, &item.id).await.map(Json)
}
