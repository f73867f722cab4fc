//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    infrastructure::dto::http::{HealthDto, StatsDto},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_string(),
    })
}

/// Connection counts of the multiplexer
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsDto>, StatusCode> {
    match state.multiplexer.stats().await {
        Ok(stats) => Ok(Json(stats.into())),
        Err(e) => {
            tracing::error!("Failed to read multiplexer stats: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
