//! Late-bound tool invocation.
//!
//! A call arrives as a tool name plus a loosely typed `arguments` object. The
//! dispatcher checks the envelope, resolves the tool, validates the parameter
//! payload against the registered schema and the handle's own typed check,
//! invokes the handle against the requested target and normalizes whatever
//! comes back into a JSON object.

use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::registry::{ToolOutput, ToolRegistry};

/// Argument keys that belong to the call envelope rather than to `params`.
const TARGET_KEY: &str = "target";
const PARAMS_KEY: &str = "params";
const PAGE_TOKEN_KEY: &str = "pageToken";

/// A parsed call envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub name: String,
    pub target: u16,
    /// Nested `params` if given, otherwise the remaining top-level fields.
    pub params: Option<Value>,
    pub page_token: Option<String>,
}

impl DispatchRequest {
    /// Split a raw `arguments` object into its envelope parts.
    pub fn from_arguments(name: &str, arguments: Value) -> Result<Self> {
        let invalid = |reason: String| GatewayError::InvalidRequest {
            tool: name.to_string(),
            reason,
        };

        let mut fields = match arguments {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => {
                return Err(invalid(format!(
                    "arguments must be an object, got {}",
                    json_type(&other)
                )))
            }
        };

        let target = match fields.remove(TARGET_KEY) {
            None | Some(Value::Null) => {
                return Err(invalid("'target' is required".to_string()));
            }
            Some(raw) => raw
                .as_u64()
                .and_then(|port| u16::try_from(port).ok())
                .ok_or_else(|| invalid(format!("'target' must be a port number, got {raw}")))?,
        };

        let page_token = match fields.remove(PAGE_TOKEN_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(token)) => Some(token),
            Some(other) => {
                return Err(invalid(format!(
                    "'pageToken' must be a string, got {}",
                    json_type(&other)
                )))
            }
        };

        let params = match fields.remove(PARAMS_KEY) {
            Some(Value::Null) | None if fields.is_empty() => None,
            Some(Value::Null) | None => Some(Value::Object(fields)),
            Some(nested) => Some(nested),
        };

        Ok(Self {
            name: name.to_string(),
            target,
            params,
            page_token,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Stateless dispatcher over a frozen registry. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Parse `arguments` and run the call.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<Map<String, Value>> {
        let request = DispatchRequest::from_arguments(name, arguments)?;
        self.execute(request).await
    }

    pub async fn execute(&self, request: DispatchRequest) -> Result<Map<String, Value>> {
        let DispatchRequest {
            name,
            target,
            params,
            page_token,
        } = request;

        let tool = self.registry.lookup(&name)?;

        let validated = match &tool.params_schema {
            Some(schema) => {
                let raw = params.unwrap_or_else(|| Value::Object(Map::new()));
                schema
                    .check(&raw)
                    .map_err(|violations| GatewayError::Validation {
                        tool: name.clone(),
                        violations,
                    })?;
                let validated =
                    tool.handle
                        .validate(raw)
                        .map_err(|violations| GatewayError::Validation {
                            tool: name.clone(),
                            violations,
                        })?;
                Some(validated)
            }
            None => {
                if params.is_some() {
                    tracing::debug!(tool = %name, "Ignoring params for a tool without a params schema");
                }
                None
            }
        };

        // Forwarded as given; a handle that does not page ignores it.
        let call_id = Uuid::new_v4();
        tracing::debug!(%call_id, tool = %name, target, "Invoking tool");

        match tool.handle.invoke(target, validated, page_token).await {
            Ok(output) => Ok(normalize(output)),
            Err(source) => {
                tracing::error!(%call_id, tool = %name, target, error = %source, "Tool execution failed");
                Err(GatewayError::Execution {
                    tool: name,
                    target,
                    source,
                })
            }
        }
    }
}

/// Turn a handle's output into the transport shape: empty → `{}`, structured →
/// the object with null fields removed at every depth, primitive →
/// `{"result": value}`.
pub fn normalize(output: ToolOutput) -> Map<String, Value> {
    match output {
        ToolOutput::Empty => Map::new(),
        ToolOutput::Structured(map) => strip_nulls(map),
        ToolOutput::Primitive(value) => {
            let mut map = Map::new();
            map.insert("result".to_string(), value);
            map
        }
    }
}

fn strip_nulls(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key, strip_nested(value)))
        .collect()
}

fn strip_nested(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_nulls(map)),
        // Array positions are meaningful, so null elements stay.
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nested).collect()),
        other => other,
    }
}
