//! Tool handles and definitions.
//!
//! Every registered tool is reached through the object-safe [`ToolHandle`]
//! interface. Strongly typed Rust tools implement [`Operation`] instead and are
//! adapted with [`TypedTool`], which derives their schemas and performs typed
//! validation of the raw JSON payload.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::{error::ValidationErrorKind, JSONSchema};
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::error::{FieldViolation, GatewayError, Result};

/// Parameter object produced by [`ToolHandle::validate`] and consumed by
/// [`ToolHandle::invoke`] of the same handle.
pub struct ValidatedParams(Box<dyn Any + Send>);

impl ValidatedParams {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Recover the concrete parameter type; returns `self` unchanged on mismatch.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Self> {
        match self.0.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(inner) => Err(Self(inner)),
        }
    }
}

impl fmt::Debug for ValidatedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidatedParams(..)")
    }
}

/// Raw value returned by a handle, before transport normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Empty,
    Structured(Map<String, Value>),
    Primitive(Value),
}

impl ToolOutput {
    /// Classify a serializable value: objects are structured, null is empty,
    /// everything else is a primitive.
    pub fn from_serialize<T: Serialize>(value: Option<T>) -> serde_json::Result<Self> {
        let Some(value) = value else {
            return Ok(ToolOutput::Empty);
        };
        Ok(Self::from_value(serde_json::to_value(value)?))
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => ToolOutput::Empty,
            Value::Object(map) => ToolOutput::Structured(map),
            other => ToolOutput::Primitive(other),
        }
    }
}

/// Closed capability interface every dispatchable tool implements.
#[async_trait]
pub trait ToolHandle: Send + Sync {
    /// Whether `invoke` accepts a pagination token.
    fn supports_paging(&self) -> bool {
        false
    }

    /// Coerce a raw parameter payload into the handle's parameter object.
    fn validate(&self, raw: Value) -> std::result::Result<ValidatedParams, Vec<FieldViolation>>;

    async fn invoke(
        &self,
        target: u16,
        params: Option<ValidatedParams>,
        page_token: Option<String>,
    ) -> anyhow::Result<ToolOutput>;
}

/// A strongly typed tool implemented in Rust.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    type Params: DeserializeOwned + JsonSchema + Send + 'static;
    type Output: Serialize + JsonSchema + Send;

    /// Whether the operation takes a pagination token.
    const PAGED: bool = false;

    /// Whether the operation takes structured parameters at all. When false,
    /// `Params` must deserialize from an empty object.
    const TAKES_PARAMS: bool = true;

    async fn run(
        &self,
        target: u16,
        params: Self::Params,
        page_token: Option<String>,
    ) -> anyhow::Result<Option<Self::Output>>;
}

/// Adapts an [`Operation`] to the [`ToolHandle`] interface.
pub struct TypedTool<O: Operation> {
    operation: O,
}

impl<O: Operation> TypedTool<O> {
    pub fn new(operation: O) -> Self {
        Self { operation }
    }

    pub fn params_schema() -> Option<Value> {
        O::TAKES_PARAMS.then(schema_value::<O::Params>)
    }

    pub fn result_schema() -> Option<Value> {
        Some(schema_value::<O::Output>())
    }
}

fn schema_value<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

#[async_trait]
impl<O: Operation> ToolHandle for TypedTool<O> {
    fn supports_paging(&self) -> bool {
        O::PAGED
    }

    fn validate(&self, raw: Value) -> std::result::Result<ValidatedParams, Vec<FieldViolation>> {
        serde_json::from_value::<O::Params>(raw)
            .map(ValidatedParams::new)
            .map_err(|e| vec![violation_from_serde(&e)])
    }

    async fn invoke(
        &self,
        target: u16,
        params: Option<ValidatedParams>,
        page_token: Option<String>,
    ) -> anyhow::Result<ToolOutput> {
        let params = match params {
            Some(params) => params
                .downcast::<O::Params>()
                .map_err(|_| anyhow::anyhow!("parameter object was validated by another handle"))?,
            // Parameterless operations deserialize their params from an empty object.
            None => serde_json::from_value(Value::Object(Map::new()))?,
        };

        let output = self.operation.run(target, params, page_token).await?;
        Ok(ToolOutput::from_serialize(output)?)
    }
}

/// Translate a serde error into a violation, extracting the field name from
/// "missing field `x`" / "unknown field `x`" style messages.
fn violation_from_serde(err: &serde_json::Error) -> FieldViolation {
    let message = err.to_string();
    let field = ["missing field `", "unknown field `", "duplicate field `"]
        .iter()
        .find_map(|prefix| {
            let rest = message.strip_prefix(prefix)?;
            rest.split('`').next().map(str::to_string)
        })
        .unwrap_or_else(|| "params".to_string());
    FieldViolation::new(field, message)
}

/// A params schema kept both as JSON (for the catalog) and compiled (for validation).
pub struct ParamsSchema {
    schema: Value,
    compiled: JSONSchema,
}

impl ParamsSchema {
    pub fn compile(schema: Value) -> Result<Self> {
        let compiled = JSONSchema::compile(&schema)
            .map_err(|e| GatewayError::Registration(format!("invalid params schema: {e}")))?;
        Ok(Self { schema, compiled })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Structural validation of a raw payload. Collects every violation.
    pub fn check(&self, instance: &Value) -> std::result::Result<(), Vec<FieldViolation>> {
        match self.compiled.validate(instance) {
            Ok(()) => Ok(()),
            Err(errors) => Err(errors
                .map(|error| {
                    let mut field = error.instance_path.to_string();
                    if let ValidationErrorKind::Required { property } = &error.kind {
                        let name = property
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| property.to_string());
                        field = format!("{field}/{name}");
                    }
                    let field = field.trim_start_matches('/');
                    let field = if field.is_empty() { "params" } else { field };
                    FieldViolation::new(field, error.to_string())
                })
                .collect()),
        }
    }
}

impl fmt::Debug for ParamsSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamsSchema")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Registry record for one tool. Immutable once registered.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub title: String,
    pub description: String,
    pub handle: Arc<dyn ToolHandle>,
    pub params_schema: Option<Arc<ParamsSchema>>,
    pub result_schema: Option<Value>,
    pub supports_paging: bool,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("supports_paging", &self.supports_paging)
            .field("has_params", &self.params_schema.is_some())
            .finish_non_exhaustive()
    }
}
