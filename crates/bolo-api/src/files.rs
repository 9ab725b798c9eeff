use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use bolo_types::api::{Claims, UploadResponse};

use crate::auth::AppState;

/// 50 MB upload limit for images and voice notes
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// File extension to keep on the stored name, e.g. `png` or `webm`
    pub ext: Option<String>,
}

/// POST /api/upload — accepts the raw file body, saves it under the upload
/// directory with a generated name and returns its public URL. The URL is
/// what clients put in a message's `image` or `audio` field.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UploadQuery>,
    bytes: Bytes,
) -> Result<impl IntoResponse, StatusCode> {
    if bytes.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    if bytes.len() > MAX_FILE_SIZE {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    let name = stored_name(query.ext.as_deref());

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| {
            error!("Failed to create upload directory: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let file_path = state.upload_dir.join(&name);
    let mut file = tokio::fs::File::create(&file_path).await.map_err(|e| {
        error!("Failed to create file {}: {}", file_path.display(), e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    file.write_all(&bytes).await.map_err(|e| {
        error!("Failed to write file {}: {}", file_path.display(), e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!("{} uploaded {} ({} bytes)", claims.sub, name, bytes.len());

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: format!("{}/uploads/{}", state.public_url, name),
        }),
    ))
}

/// Random file name. The extension is kept only if it is short and
/// alphanumeric, so the name can never escape the upload directory.
fn stored_name(ext: Option<&str>) -> String {
    let id = Uuid::new_v4();
    match ext.map(|e| e.trim_start_matches('.')) {
        Some(ext)
            if !ext.is_empty()
                && ext.len() <= 8
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!("{}.{}", id, ext.to_ascii_lowercase())
        }
        _ => id.to_string(),
    }
}
