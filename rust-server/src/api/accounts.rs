use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{info, warn};

use super::{json_body, AppState};
use crate::db::User;
use crate::error::ApiError;

// ============================================================================
// HTTP Handlers - Authentication
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: User,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.username.trim().chars().count() < 3 {
            return Err(ApiError::BadRequest(
                "Username must be at least 3 characters".to_string(),
            ));
        }
        if self.password.chars().count() < 6 {
            return Err(ApiError::BadRequest(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(ApiError::BadRequest("Invalid email address".to_string()));
        }
        Ok(())
    }
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let client_ip = addr.ip().to_string();

    if !state.auth_rate_limiter.check(&client_ip) {
        warn!("Rate limit exceeded for registration from {}", client_ip);
        return Err(ApiError::TooManyRequests);
    }

    let req = json_body(payload)?;
    req.validate()?;

    let username = req.username.trim();
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(username);

    let user = state
        .db
        .create_user(username, req.email.trim(), &req.password, display_name)
        .await?;

    info!("Account registered: {} (id: {}) from {}", user.username, user.id, client_ip);
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let client_ip = addr.ip().to_string();

    if !state.auth_rate_limiter.check(&client_ip) {
        warn!("Rate limit exceeded for login from {}", client_ip);
        return Err(ApiError::TooManyRequests);
    }

    let req = json_body(payload)?;
    let Some(user) = state
        .db
        .verify_user_password(req.username.trim(), &req.password)
        .await?
    else {
        state.auth_rate_limiter.record_failure(&client_ip);
        warn!("Failed login attempt for '{}' from {}", req.username, client_ip);
        return Err(ApiError::Unauthorized("Invalid username or password".to_string()));
    };

    let token = state
        .tokens
        .create_token(&user.id, &user.username)
        .ok_or_else(|| ApiError::Internal("Failed to create token".to_string()))?;

    info!("Account logged in: {} (id: {}) from {}", user.username, user.id, client_ip);
    Ok(Json(LoginResponse { token, user }))
}

/// POST /api/auth/logout
///
/// Tokens are stateless, so there is nothing to revoke server-side.
pub async fn logout() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Logged out successfully" }))
}

/// GET /api/auth/profile
pub async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;

    state
        .db
        .get_user(&auth.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}
