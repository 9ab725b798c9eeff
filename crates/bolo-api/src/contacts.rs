use axum::{Extension, Json, extract::State, http::StatusCode};

use bolo_types::api::{Claims, Contact};

use crate::auth::{AppState, to_user};
use crate::run_db;

/// GET /api/users — everyone except the caller, with live presence.
pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Contact>>, StatusCode> {
    let rows = run_db(&state.db, move |db| db.list_users_except(&claims.sub)).await?;

    let rooms = state.pipeline.rooms();
    let contacts = rows
        .into_iter()
        .map(|row| {
            let online = rooms.is_online(&row.id);
            Contact {
                user: to_user(row),
                online,
            }
        })
        .collect();

    Ok(Json(contacts))
}
