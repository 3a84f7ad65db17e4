//! Health check endpoint.

use axum::Json;

use crate::dto::HealthResponse;

/// Returns the server health status and version.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
