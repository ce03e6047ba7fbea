use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::FieldViolation;
use crate::registry::{ToolHandle, ToolOutput, ValidatedParams};
use crate::transport::Transport;

/// Handle for a manifest tool: forwards the call as a named command to the
/// target through the transport.
pub struct RemoteCommand {
    command: String,
    paged: bool,
    transport: Arc<dyn Transport>,
}

impl RemoteCommand {
    pub fn new(command: impl Into<String>, paged: bool, transport: Arc<dyn Transport>) -> Self {
        Self {
            command: command.into(),
            paged,
            transport,
        }
    }
}

#[async_trait]
impl ToolHandle for RemoteCommand {
    fn supports_paging(&self) -> bool {
        self.paged
    }

    /// Remote tools have no Rust-side types; the registered schema is the
    /// only check.
    fn validate(&self, raw: Value) -> std::result::Result<ValidatedParams, Vec<FieldViolation>> {
        Ok(ValidatedParams::new(raw))
    }

    async fn invoke(
        &self,
        target: u16,
        params: Option<ValidatedParams>,
        page_token: Option<String>,
    ) -> anyhow::Result<ToolOutput> {
        let mut parameters = match params {
            Some(params) => Some(
                params
                    .downcast::<Value>()
                    .map_err(|_| anyhow::anyhow!("unexpected parameter object for remote command"))?,
            ),
            None => None,
        };

        let page_token = match page_token {
            Some(token) if !self.paged => {
                tracing::debug!(command = %self.command, token = %token, "Command does not page, ignoring pageToken");
                None
            }
            other => other,
        };

        if let Some(token) = page_token {
            let mut object = match parameters.take() {
                Some(Value::Object(object)) => object,
                Some(other) => {
                    anyhow::bail!("cannot attach a page token to non-object parameters: {other}")
                }
                None => Map::new(),
            };
            object.insert("pageToken".to_string(), Value::String(token));
            parameters = Some(Value::Object(object));
        }

        let result = self
            .transport
            .execute(target, &self.command, parameters)
            .await?;
        Ok(ToolOutput::from_value(result))
    }
}
