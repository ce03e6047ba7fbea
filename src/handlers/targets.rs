use crate::error::Result;
use crate::state::AppState;
use crate::transport::TargetInfo;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct TargetsResponse {
    pub targets: Vec<TargetInfo>,
}

/// GET /targets - Refresh connections and list reachable backend targets.
pub async fn targets_handler(State(state): State<Arc<AppState>>) -> Result<Json<TargetsResponse>> {
    let targets = state.transport.list_targets().await?;
    Ok(Json(TargetsResponse { targets }))
}
