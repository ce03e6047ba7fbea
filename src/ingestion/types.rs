//! Type definitions for the ingestion module.

use serde::Deserialize;
use serde_json::Value;

/// One entry of a tool manifest.
///
/// Manifests come either from a code generator or from an MCP server's
/// `list_tools` response, so only `name` is mandatory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestTool {
    pub name: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Backend command to run. Defaults to `name`.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub input_schema: Option<Value>,

    #[serde(default)]
    pub output_schema: Option<Value>,

    #[serde(default)]
    pub paged: bool,
}

impl ManifestTool {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or(&self.name)
    }

    /// Whether the tool takes a pagination token, either declared directly or
    /// implied by a gateway-shaped input schema.
    pub fn is_paged(&self) -> bool {
        self.paged
            || envelope_property(self.input_schema.as_ref(), "pageToken").is_some()
    }

    /// The schema of the tool's `params` object, or `None` when it takes none.
    ///
    /// A gateway-shaped input schema (`{target, params, pageToken?}`, as this
    /// service itself publishes) is unwrapped to its `params` member, with
    /// shared definitions carried along.
    pub fn params_schema(&self) -> Option<Value> {
        let schema = self.input_schema.as_ref()?;

        if envelope_property(Some(schema), "target").is_some() {
            let mut params = envelope_property(Some(schema), "params")?.clone();
            for key in ["definitions", "$defs"] {
                if let (Some(defs), Some(obj)) = (schema.get(key), params.as_object_mut()) {
                    obj.entry(key).or_insert_with(|| defs.clone());
                }
            }
            return takes_parameters(&params).then_some(params);
        }

        takes_parameters(schema).then(|| schema.clone())
    }
}

fn envelope_property<'a>(schema: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    schema?.get("properties")?.get(name)
}

/// A schema describes parameters when it names properties or composes other schemas.
fn takes_parameters(schema: &Value) -> bool {
    let has_properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty());

    has_properties
        || ["$ref", "anyOf", "oneOf", "allOf"]
            .iter()
            .any(|key| schema.get(key).is_some())
}
