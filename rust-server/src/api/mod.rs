//! HTTP surface: shared state, router and request helpers.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::{RateLimiter, TokenSigner};
use crate::db::Database;
use crate::error::ApiError;
use crate::shop::{ShopGenerator, ShopService, VendorRegistry};

mod accounts;
mod cards;
mod groups;
mod inventories;
mod shops;

/// Register/login attempts allowed per IP per window
const AUTH_RATE_LIMIT: u32 = 10;
const AUTH_RATE_WINDOW: Duration = Duration::from_secs(60);

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub shops: ShopService,
    pub tokens: TokenSigner,
    pub auth_rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(db: Database, vendors: VendorRegistry, tokens: TokenSigner) -> Self {
        let db = Arc::new(db);
        let generator = ShopGenerator::new(Arc::new(vendors));

        Self {
            shops: ShopService::new(db.clone(), generator),
            db,
            tokens,
            auth_rate_limiter: RateLimiter::new(AUTH_RATE_LIMIT, AUTH_RATE_WINDOW),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        // Accounts
        .route("/api/auth/register", post(accounts::register))
        .route("/api/auth/login", post(accounts::login))
        .route("/api/auth/logout", post(accounts::logout))
        .route("/api/auth/profile", get(accounts::profile))
        // Catalog
        .route("/api/cards", get(cards::list_cards).post(cards::create_card))
        .route(
            "/api/cards/:id",
            get(cards::get_card)
                .put(cards::update_card)
                .delete(cards::delete_card),
        )
        // Groups
        .route("/api/groups", get(groups::list_groups).post(groups::create_group))
        .route("/api/groups/join", post(groups::join_group))
        .route("/api/groups/:id", get(groups::get_group))
        .route("/api/groups/:id/leave", delete(groups::leave_group))
        .route("/api/groups/:id/members", get(groups::group_members))
        // Inventories
        .route(
            "/api/inventories",
            get(inventories::list_inventories).post(inventories::create_inventory),
        )
        .route("/api/inventories/:id", get(inventories::get_inventory))
        .route("/api/inventories/:id/items", post(inventories::add_item))
        .route(
            "/api/inventories/:id/items/:item_id",
            put(inventories::update_item).delete(inventories::remove_item),
        )
        .route("/api/inventories/items/:item_id/equip", put(inventories::equip_item))
        // Shops
        .route("/api/shops", post(shops::create_shop))
        .route("/api/shops/:slug", get(shops::get_shop))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(allowed))
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// Extractor Helpers
// ============================================================================

/// Unwrap a JSON body, turning malformed payloads into our error shape
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Normalize a UUID path segment, rejecting anything else with `message`
fn parse_id(id: &str, message: &str) -> Result<String, ApiError> {
    uuid::Uuid::parse_str(id)
        .map(|uuid| uuid.to_string())
        .map_err(|_| ApiError::BadRequest(message.to_string()))
}

fn query_params<T>(
    query: Result<axum::extract::Query<T>, QueryRejection>,
) -> Result<T, ApiError> {
    query
        .map(|axum::extract::Query(params)| params)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}
