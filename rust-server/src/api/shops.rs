use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use tracing::info;

use super::AppState;
use crate::error::ApiError;
use crate::shop::ShopAssortment;

// ============================================================================
// HTTP Handlers - Shops
// ============================================================================

/// POST /api/shops - roll a fresh assortment from the current catalog
pub async fn create_shop(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ShopAssortment>, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let shop = state.shops.create_shop().await?;

    info!("{} generated shop {}", auth.username, shop.slug);
    Ok(Json(shop))
}

/// GET /api/shops/:slug - the stored document, byte for byte
pub async fn get_shop(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state
        .shops
        .get_shop_json(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Shop not found".to_string()))?;

    Ok(([(header::CONTENT_TYPE, "application/json")], data))
}
