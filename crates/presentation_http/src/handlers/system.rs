//! System status and health handlers

use std::collections::HashMap;

use axum::{Json, extract::State};
use orchestration::{HealthReport, SystemStatus};
use tracing::instrument;

use crate::{error::ApiError, state::AppState};

/// Live system status: per-model state plus aggregate statistics
#[instrument(skip(state))]
pub async fn status(State(state): State<AppState>) -> Result<Json<SystemStatus>, ApiError> {
    Ok(Json(state.orchestrator.system_status().await))
}

/// Probe every catalog model and report the results
#[instrument(skip(state))]
pub async fn health(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, HealthReport>>, ApiError> {
    Ok(Json(state.orchestrator.health_check_all().await))
}
