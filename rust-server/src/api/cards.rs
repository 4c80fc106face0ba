use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{json_body, parse_id, query_params, AppState};
use crate::card::{validate_card, Card, CreateCardRequest, UpdateCardRequest};
use crate::db::{CardFilter, CardPage};
use crate::error::ApiError;

// ============================================================================
// HTTP Handlers - Cards
// ============================================================================

fn parse_card_id(id: &str) -> Result<String, ApiError> {
    parse_id(id, "Invalid card id")
}

fn card_not_found() -> ApiError {
    ApiError::NotFound("Card not found".to_string())
}

/// GET /api/cards
pub async fn list_cards(
    State(state): State<AppState>,
    query: Result<Query<CardFilter>, QueryRejection>,
) -> Result<Json<CardPage>, ApiError> {
    let filter = query_params(query)?;
    Ok(Json(state.db.list_cards(&filter).await?))
}

/// GET /api/cards/:id
pub async fn get_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Card>, ApiError> {
    let id = parse_card_id(&id)?;
    state
        .db
        .get_card(&id)
        .await?
        .map(Json)
        .ok_or_else(card_not_found)
}

/// POST /api/cards
pub async fn create_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateCardRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let req = json_body(payload)?;

    let card_number = state.db.next_card_number().await?;
    let card = Card::from_request(Uuid::new_v4().to_string(), card_number, req, Utc::now());
    validate_card(&card)?;

    if let Err(e) = state.db.insert_card(&card).await {
        if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
            warn!("Card number {} was taken concurrently", card.card_number);
            return Err(ApiError::Conflict("Card number already in use, please retry".to_string()));
        }
        return Err(e.into());
    }

    info!("{} created card {}", auth.username, card.card_number);
    Ok((StatusCode::CREATED, Json(card)))
}

/// PUT /api/cards/:id
pub async fn update_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdateCardRequest>, JsonRejection>,
) -> Result<Json<Card>, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let id = parse_card_id(&id)?;
    let req = json_body(payload)?;

    let mut card = state.db.get_card(&id).await?.ok_or_else(card_not_found)?;
    card.apply_update(req, Utc::now());
    validate_card(&card)?;

    if !state.db.update_card(&card).await? {
        return Err(card_not_found());
    }

    info!("{} updated card {}", auth.username, card.card_number);
    Ok(Json(card))
}

/// DELETE /api/cards/:id
pub async fn delete_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let id = parse_card_id(&id)?;

    if !state.db.delete_card(&id).await? {
        return Err(card_not_found());
    }

    info!("{} deleted card {}", auth.username, id);
    Ok(Json(serde_json::json!({ "message": "Card deleted successfully" })))
}
