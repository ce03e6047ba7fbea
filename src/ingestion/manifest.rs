//! Tool manifest parsing.
//!
//! Accepts an MCP `list_tools` JSON-RPC response (`result.tools`), an object
//! with a top-level `tools` array, or a bare array of tool entries.

use std::path::Path;

use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::ingestion::types::ManifestTool;

/// Read and parse a manifest file.
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestTool>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::Registration(format!(
            "Failed to read tool manifest {}: {e}",
            path.display()
        ))
    })?;

    let json: Value = serde_json::from_str(&content)
        .map_err(|e| GatewayError::Registration(format!("Tool manifest is not valid JSON: {e}")))?;

    parse_manifest(&json)
}

/// Parse every tool entry in a manifest document.
///
/// Individual malformed tools are logged and skipped (partial success model);
/// the call fails only when the document has no tool array or when every entry
/// is malformed.
pub fn parse_manifest(json: &Value) -> Result<Vec<ManifestTool>> {
    let entries = extract_tools_array(json)?;
    let mut tools = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.iter().enumerate() {
        match serde_json::from_value::<ManifestTool>(entry.clone()) {
            Ok(tool) => tools.push(tool),
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "Skipping malformed tool definition");
            }
        }
    }

    if tools.is_empty() && !entries.is_empty() {
        return Err(GatewayError::Registration(
            "All tool definitions failed to parse".into(),
        ));
    }

    tracing::debug!(total = entries.len(), parsed = tools.len(), "Tool manifest parsed");
    Ok(tools)
}

fn extract_tools_array(json: &Value) -> Result<&Vec<Value>> {
    json.get("result")
        .and_then(|r| r.get("tools"))
        .or_else(|| json.get("tools"))
        .unwrap_or(json)
        .as_array()
        .ok_or_else(|| {
            GatewayError::Registration(
                "Expected 'result.tools', 'tools' or a top-level array in tool manifest".into(),
            )
        })
}
