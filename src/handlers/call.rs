use crate::error::Result;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub name: String,
    /// Must contain `target`; may contain `params` and `pageToken`.
    #[serde(default)]
    pub arguments: Value,
}

/// POST /tools/call - Validate and run a registered tool against a target.
pub async fn call_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CallRequest>,
) -> Result<Json<Map<String, Value>>> {
    let start_time = std::time::Instant::now();

    let result = state
        .dispatcher
        .dispatch(&request.name, request.arguments)
        .await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    let elapsed = start_time.elapsed();

    tracing::debug!(
        tool = %request.name,
        outcome,
        elapsed_ms = elapsed.as_millis() as u64,
        "Tool call finished"
    );

    metrics::counter!(
        "dispatch_requests_total",
        "tool" => request.name,
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("dispatch_latency_ms").record(elapsed.as_millis() as f64);

    result.map(Json)
}
