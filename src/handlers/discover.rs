//! Natural-language tool discovery.

use crate::error::{GatewayError, Result};
use crate::search::ToolMatch;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const OPERATION: &str = "discover_tools";

#[derive(Debug, Deserialize)]
pub struct DiscoverRequest {
    /// The natural language query to match against tools
    pub query: String,
    /// Overrides the configured candidate count
    #[serde(default)]
    pub limit: Option<usize>,
    /// Overrides the configured similarity threshold
    #[serde(default)]
    pub threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct DiscoverResponse {
    pub tools: Vec<ToolMatch>,
}

/// POST /tools/discover - Find tools relevant to a natural language query.
///
/// # Flow
/// 1. Validate input
/// 2. Acquire semaphore permit (bounded concurrent embeddings)
/// 3. Embed the query and search the index on the blocking pool
///
/// Without a semantic index the search degrades to keyword matching and
/// results carry no score.
pub async fn discover_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DiscoverRequest>,
) -> Result<Json<DiscoverResponse>> {
    let start_time = std::time::Instant::now();
    let invalid = |reason: &str| GatewayError::InvalidRequest {
        tool: OPERATION.to_string(),
        reason: reason.to_string(),
    };

    if request.query.trim().is_empty() {
        return Err(invalid("Query cannot be empty"));
    }

    let options = state.search.options();
    let limit = request.limit.unwrap_or(options.limit);
    let threshold = request.threshold.unwrap_or(options.threshold);

    if limit == 0 {
        return Err(invalid("limit must be at least 1"));
    }
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(invalid("threshold must be in (0, 1]"));
    }

    // Acquire semaphore with timeout (503 if service overloaded)
    let _permit = tokio::time::timeout(Duration::from_secs(10), state.semaphore.acquire())
        .await
        .map_err(|_| {
            GatewayError::Unavailable("Service temporarily overloaded, please retry".to_string())
        })?
        .map_err(|_| GatewayError::Unavailable("Semaphore closed".to_string()))?;

    let search = Arc::clone(&state.search);
    let query = request.query.clone();

    let (mode, tools) = tokio::time::timeout(
        Duration::from_secs(30),
        tokio::task::spawn_blocking(move || search.search_with_mode(&query, limit, threshold)),
    )
    .await
    .map_err(|_| GatewayError::Unavailable("Discovery timeout exceeded (30s)".to_string()))?
    .map_err(|e| GatewayError::Model(format!("Discovery task join error: {}", e)))?;

    let mode = mode.as_str();
    let total_time = start_time.elapsed();

    tracing::info!(
        query = %request.query,
        mode,
        limit,
        threshold,
        results = tools.len(),
        total_ms = total_time.as_millis() as u64,
        "Discovery completed"
    );

    metrics::counter!("discover_requests_total", "mode" => mode).increment(1);
    metrics::histogram!("discover_latency_ms").record(total_time.as_millis() as f64);

    Ok(Json(DiscoverResponse { tools }))
}
