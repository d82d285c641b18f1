use axum::{extract::State, Extension, Json};

use crate::envelope::CreationsResponse;
use crate::errors::AppError;
use crate::quota::AccountContext;
use crate::state::AppState;

/// GET /api/user/get-user-creations
pub async fn handle_user_creations(
    State(state): State<AppState>,
    Extension(account): Extension<AccountContext>,
) -> Result<Json<CreationsResponse>, AppError> {
    let creations = state.creations.list_for_user(&account.user_id).await?;
    Ok(Json(CreationsResponse::new(creations)))
}

/// GET /api/user/get-published-creations
pub async fn handle_published_creations(
    State(state): State<AppState>,
) -> Result<Json<CreationsResponse>, AppError> {
    let creations = state.creations.list_published().await?;
    Ok(Json(CreationsResponse::new(creations)))
}
