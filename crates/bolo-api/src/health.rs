use axum::Json;

use bolo_types::api::HealthResponse;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        message: "Server is running".into(),
        timestamp: chrono::Utc::now(),
    })
}
