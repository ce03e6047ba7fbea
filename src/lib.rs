//! Toolgate - tool discovery and dispatch gateway
//!
//! Keeps a registry of schema-described backend operations, answers
//! natural-language discovery queries over them with an embedding index (or
//! keyword matching when no model is available), and validates and dispatches
//! calls to a chosen backend target.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod ingestion;
pub mod persistence;
pub mod registry;
pub mod search;
pub mod state;
pub mod transport;

// Re-export key types for convenience
pub use config::Config;
pub use dispatch::{DispatchRequest, Dispatcher};
pub use error::{FieldViolation, GatewayError, Result};
pub use handlers::router;
pub use inference::{BiEncoderModel, Embedder};
pub use registry::{Operation, ToolDefinition, ToolHandle, ToolOutput, ToolRegistry};
pub use search::{SearchMode, SearchOptions, SearchService, ToolMatch};
pub use state::AppState;
pub use transport::{HttpTransport, TargetInfo, Transport};
