//! Ingestion of tool definitions into the registry.
//!
//! Two sources feed the registry at startup: the gateway's own typed tools and
//! an optional JSON manifest of backend commands.

pub mod builtin;
pub mod manifest;
pub mod remote;
pub mod types;

use std::sync::Arc;

use crate::registry::ToolRegistry;
use crate::transport::Transport;

pub use builtin::{register_builtins, DescribeTarget, DESCRIBE_TARGET};
pub use manifest::{load_manifest, parse_manifest};
pub use remote::RemoteCommand;
pub use types::ManifestTool;

/// Register every manifest tool as a [`RemoteCommand`]. Tools whose schema
/// cannot be compiled are logged and skipped. Returns the number registered.
pub fn register_manifest(
    registry: &mut ToolRegistry,
    tools: Vec<ManifestTool>,
    transport: Arc<dyn Transport>,
) -> usize {
    let mut registered = 0;

    for tool in tools {
        let paged = tool.is_paged();
        let handle = Arc::new(RemoteCommand::new(tool.command(), paged, transport.clone()));

        match registry.register(
            &tool.name,
            tool.title(),
            tool.description(),
            handle,
            tool.params_schema(),
            tool.output_schema.clone(),
        ) {
            Ok(()) => registered += 1,
            Err(e) => tracing::warn!(tool = %tool.name, error = %e, "Skipping tool"),
        }
    }

    tracing::info!(registered, "Manifest tools registered");
    registered
}
