//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::warn;

use crate::{AppState, error::ApiError};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check (includes database)
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, ApiError> {
    infra_db::ping(&state.pool).await.map_err(|e| {
        warn!(error = %e, "Readiness check failed");
        ApiError::Unavailable("database".to_string())
    })?;

    Ok(Json(HealthResponse {
        status: "ready".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
