//! Connection layer to backend targets.
//!
//! The gateway only needs two things from a backend: a way to enumerate
//! reachable targets and a way to run a named command on one of them.
//! [`HttpTransport`] speaks JSON over HTTP to targets listening on local ports.

use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinSet;

use crate::error::{GatewayError, Result};

/// A reachable backend target and the identity it reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TargetInfo {
    pub target: u16,
    pub identity: Value,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Refresh connections and list every target currently answering.
    async fn list_targets(&self) -> Result<Vec<TargetInfo>>;

    /// Ask a single target for its identity.
    async fn describe(&self, target: u16) -> anyhow::Result<TargetInfo>;

    /// Run `command` on `target`, returning the unwrapped result payload.
    async fn execute(
        &self,
        target: u16,
        command: &str,
        parameters: Option<Value>,
    ) -> anyhow::Result<Value>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    host: String,
    ports: RangeInclusive<u16>,
    identity_command: String,
}

impl HttpTransport {
    pub fn new(
        host: impl Into<String>,
        ports: RangeInclusive<u16>,
        timeout: Duration,
        identity_command: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            host: host.into(),
            ports,
            identity_command: identity_command.into(),
        })
    }

    fn url(&self, target: u16) -> String {
        format!("http://{}:{}", self.host, target)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_targets(&self) -> Result<Vec<TargetInfo>> {
        let mut probes = JoinSet::new();
        for port in self.ports.clone() {
            let transport = self.clone();
            probes.spawn(async move { (port, transport.describe(port).await) });
        }

        let mut targets = Vec::new();
        while let Some(joined) = probes.join_next().await {
            let (port, result) =
                joined.map_err(|e| GatewayError::Transport(format!("Probe task failed: {e}")))?;
            match result {
                Ok(info) => targets.push(info),
                Err(e) => tracing::trace!(port, error = %e, "Port not answering"),
            }
        }

        targets.sort_by_key(|t| t.target);
        tracing::info!(count = targets.len(), "Found active targets");
        Ok(targets)
    }

    async fn describe(&self, target: u16) -> anyhow::Result<TargetInfo> {
        let identity = self.execute(target, &self.identity_command, None).await?;
        Ok(TargetInfo { target, identity })
    }

    async fn execute(
        &self,
        target: u16,
        command: &str,
        parameters: Option<Value>,
    ) -> anyhow::Result<Value> {
        let mut body = json!({ "command": command });
        if let Some(parameters) = parameters {
            body["parameters"] = parameters;
        }

        let response = self.client.post(self.url(target)).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("target {target} returned HTTP {status}: {text}");
        }

        let payload: Value = response.json().await?;
        unwrap_envelope(payload)
    }
}

/// Unwrap `{"succeeded": bool, "result"| "error": ...}` envelopes; any other
/// body is returned unchanged.
pub fn unwrap_envelope(payload: Value) -> anyhow::Result<Value> {
    let Some(succeeded) = payload.get("succeeded").and_then(Value::as_bool) else {
        return Ok(payload);
    };

    if succeeded {
        return Ok(payload.get("result").cloned().unwrap_or(Value::Null));
    }

    let error = payload.get("error").cloned().unwrap_or(Value::Null);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    anyhow::bail!("command failed: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_success_envelope() {
        let value = unwrap_envelope(json!({ "succeeded": true, "result": { "id": 1 } })).unwrap();
        assert_eq!(value, json!({ "id": 1 }));
    }

    #[test]
    fn test_unwrap_success_without_result_is_null() {
        let value = unwrap_envelope(json!({ "succeeded": true })).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_unwrap_failure_envelope() {
        let err = unwrap_envelope(json!({
            "succeeded": false,
            "error": { "code": 4, "message": "Element not found" }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Element not found"));
    }

    #[test]
    fn test_plain_body_passes_through() {
        let value = unwrap_envelope(json!({ "elements": [] })).unwrap();
        assert_eq!(value, json!({ "elements": [] }));
    }

    #[tokio::test]
    async fn test_unreachable_targets_are_skipped() {
        // Port 9 (discard) is essentially never listening on loopback
        let transport =
            HttpTransport::new("127.0.0.1", 9..=9, Duration::from_millis(200), "Identify").unwrap();
        let targets = transport.list_targets().await.unwrap();
        assert!(targets.is_empty());
    }
}
