use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::error;

use bolo_gateway::error::GatewayError;
use bolo_types::api::{Claims, MarkReadResponse};
use bolo_types::models::Message;

use crate::auth::AppState;

/// GET /api/messages/{other_id} — the caller's conversation with `other_id`,
/// oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(other_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Message>>, StatusCode> {
    let messages = state
        .pipeline
        .store()
        .range(&claims.sub, &other_id)
        .await
        .map_err(|e| {
            error!("Failed to load messages {} <-> {}: {:#}", claims.sub, other_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(messages))
}

/// POST /api/messages/read/{from_user_id} — the caller has read everything
/// `from_user_id` sent them; `from_user_id` gets `messages_read`.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(from_user_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MarkReadResponse>, StatusCode> {
    let updated = state
        .pipeline
        .mark_read(&claims.sub, &from_user_id)
        .await
        .map_err(|e| match e {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Persistence(_) => {
                error!("Failed to mark messages read: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    Ok(Json(MarkReadResponse {
        success: true,
        updated,
    }))
}
