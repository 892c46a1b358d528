// handlers/public/health.rs - GET /health
use axum::extract::State;
use serde::Serialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// Round-trips to the store; 503 when it cannot be reached.
pub async fn get(State(state): State<AppState>) -> ApiResult<Health> {
    state.repositories.ping().await.map_err(|err| {
        tracing::warn!("Health check failed: {}", err);
        ApiError::service_unavailable("Database unreachable")
    })?;

    Ok(ApiResponse::success(Health { status: "ok" }))
}
