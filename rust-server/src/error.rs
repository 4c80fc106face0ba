//! HTTP-facing error type.
//!
//! Every handler failure is rendered as `{"error": "<message>"}` with a
//! matching status code. Storage details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::card::CardValidationError;
use crate::db::{AccountError, MembershipError};
use crate::shop::ShopError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Too many requests. Please try again later.")]
    TooManyRequests,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        error!("Database error: {}", e);
        ApiError::Internal("Database error".to_string())
    }
}

impl From<CardValidationError> for ApiError {
    fn from(e: CardValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::UsernameTaken | AccountError::EmailTaken => {
                ApiError::Conflict(e.to_string())
            }
            AccountError::Hash(msg) => {
                error!("Password hashing failed: {}", msg);
                ApiError::Internal("Failed to create account".to_string())
            }
            AccountError::Database(e) => e.into(),
        }
    }
}

impl From<MembershipError> for ApiError {
    fn from(e: MembershipError) -> Self {
        match e {
            MembershipError::AlreadyMember => ApiError::Conflict(e.to_string()),
            MembershipError::NotMember => ApiError::NotFound(e.to_string()),
            MembershipError::DmCannotLeave => ApiError::BadRequest(e.to_string()),
            MembershipError::Database(e) => e.into(),
        }
    }
}

impl From<ShopError> for ApiError {
    fn from(e: ShopError) -> Self {
        error!("Shop error: {}", e);
        let message = match e {
            ShopError::CatalogLoad(_) => "Failed to load cards",
            ShopError::Serialize(_) => "Failed to serialize shop",
            ShopError::Persist(_) => "Failed to save shop",
            ShopError::Read(_) => "Failed to read shop",
            ShopError::Corrupt(_) => "Stored shop is unreadable",
        };
        ApiError::Internal(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::TooManyRequests.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(MembershipError::DmCannotLeave).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AccountError::EmailTaken).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::BadRequest("Invalid card id".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Invalid card id");
    }
}
