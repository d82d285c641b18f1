use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::envelope::ApiResponse;
use crate::identity::IdentityError;
use crate::llm_client::LlmError;
use crate::providers::ProviderError;

pub const LIMIT_REACHED_MESSAGE: &str = "Limit reached. Upgrade to continue.";
pub const PREMIUM_REQUIRED_MESSAGE: &str = "Premium subscription required";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every variant renders as `{ "success": false, "message": ... }`. Refusals
/// (quota, plan, bad input) are declarative results and keep a 200 status;
/// genuine failures use a matching error status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Identity service error: {0}")]
    Identity(#[from] IdentityError),

    #[error("{}", LIMIT_REACHED_MESSAGE)]
    LimitReached,

    #[error("{}", PREMIUM_REQUIRED_MESSAGE)]
    PremiumRequired,

    #[error("{0}")]
    Validation(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Identity(IdentityError::InvalidSession(reason)) => {
                tracing::info!("Rejected session: {reason}");
                (StatusCode::UNAUTHORIZED, "Invalid or expired session".to_string())
            }
            AppError::Identity(e) => {
                tracing::error!("Identity error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "Could not load account details".to_string(),
                )
            }
            AppError::LimitReached | AppError::PremiumRequired | AppError::Validation(_) => {
                (StatusCode::OK, self.to_string())
            }
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "Text generation failed. Please try again.".to_string(),
                )
            }
            AppError::Provider(e) => {
                tracing::error!("Provider error: {e}");
                (StatusCode::BAD_GATEWAY, e.public_message().to_string())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusals_keep_ok_status() {
        let (status, message) = AppError::LimitReached.status_and_message();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message, LIMIT_REACHED_MESSAGE);

        let (status, message) = AppError::PremiumRequired.status_and_message();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message, PREMIUM_REQUIRED_MESSAGE);
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let err = AppError::Internal(anyhow::anyhow!("connection string postgres://secret"));
        let (status, message) = err.status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("secret"));
    }

    #[test]
    fn test_invalid_session_is_unauthorized() {
        let err = AppError::Identity(IdentityError::InvalidSession("expired".into()));
        let (status, _) = err.status_and_message();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
