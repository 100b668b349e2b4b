//! Query execution and recommendation handlers

use std::time::Duration;

use axum::{
    Json,
    extract::{Query, State},
};
use domain::{ModelCategory, Priority};
use orchestration::{Orchestrator, OrchestrationStatistics, Recommendation};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{error::ApiError, state::AppState};

/// Query request body
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// The natural-language query to execute
    pub query: String,
    /// Routing priority hint
    #[serde(default)]
    pub priority: Priority,
    /// Explicit model override, skips routing when set
    #[serde(default)]
    pub user_preference: Option<String>,
    /// Caller-side wait bound in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Query response body
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// Generated text
    pub response: String,
    /// Model that served the request
    pub model_used: String,
    /// Execution time in seconds
    pub response_time_secs: f64,
    /// Always true here; failures become 500s
    pub success: bool,
    /// Detected query category
    pub category: ModelCategory,
    /// Statistics after this request settled
    pub orchestration_stats: OrchestrationStatistics,
}

/// Execute a query through the orchestrator
#[instrument(skip(state, request), fields(query_len = request.query.len()))]
pub async fn execute_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query cannot be empty".to_string()));
    }

    let category = Orchestrator::classify(&request.query);
    let record = state
        .orchestrator
        .process_sync(
            &request.query,
            request.priority,
            request.user_preference.as_deref(),
            request.timeout_secs.map(Duration::from_secs),
        )
        .await;

    if !record.success {
        return Err(ApiError::Generation(
            record.error.unwrap_or_else(|| "unknown failure".to_string()),
        ));
    }

    Ok(Json(QueryResponse {
        response: record.response.unwrap_or_default(),
        model_used: record.model,
        response_time_secs: record.response_time_secs,
        success: true,
        category,
        orchestration_stats: state.orchestrator.statistics(),
    }))
}

/// Recommendation query parameters
#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    /// The query to recommend a model for
    pub query: String,
}

/// Recommend a model for a query without executing it
#[instrument(skip(state, params), fields(query_len = params.query.len()))]
pub async fn recommend(
    State(state): State<AppState>,
    Query(params): Query<RecommendationParams>,
) -> Result<Json<Recommendation>, ApiError> {
    if params.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query cannot be empty".to_string()));
    }

    let recommendation = state.orchestrator.recommendations(&params.query).await;
    Ok(Json(recommendation))
}
