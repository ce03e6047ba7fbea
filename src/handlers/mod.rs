pub mod call;
pub mod discover;
pub mod health;
pub mod targets;

pub use call::call_handler;
pub use discover::discover_handler;
pub use health::{health_handler, ready_handler};
pub use targets::targets_handler;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// All gateway routes except `/metrics`, which needs the recorder handle.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/targets", get(targets_handler))
        .route("/tools/discover", post(discover_handler))
        .route("/tools/call", post(call_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}
