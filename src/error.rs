use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// A single schema violation found while validating a tool's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Slash-separated path of the offending field inside `params`.
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Tool '{tool}' not found in registry")]
    NotFound { tool: String },

    #[error("Invalid request for tool '{tool}': {reason}")]
    InvalidRequest { tool: String, reason: String },

    #[error("Invalid parameters for tool '{tool}': {}", summarize(.violations))]
    Validation {
        tool: String,
        violations: Vec<FieldViolation>,
    },

    #[error("Tool '{tool}' failed on target {target}: {source:#}")]
    Execution {
        tool: String,
        target: u16,
        #[source]
        source: anyhow::Error,
    },

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Embedding model failed: {0}")]
    Model(String),

    #[error("Search index error: {0}")]
    Index(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl GatewayError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::InvalidRequest { .. } => "invalid_request",
            GatewayError::Validation { .. } => "validation",
            GatewayError::Execution { .. } => "execution",
            GatewayError::Registration(_) => "registration",
            GatewayError::Model(_) => "model",
            GatewayError::Index(_) => "index",
            GatewayError::Transport(_) => "transport",
            GatewayError::Config(_) => "config",
            GatewayError::Unavailable(_) => "unavailable",
        }
    }

    /// Field violations carried by a validation error; empty for every other kind.
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            GatewayError::Validation { violations, .. } => violations,
            _ => &[],
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<FieldViolation>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, tool, target) = match &self {
            GatewayError::NotFound { tool } => {
                tracing::warn!(tool = %tool, "Unknown tool requested");
                (StatusCode::NOT_FOUND, Some(tool.clone()), None)
            }
            GatewayError::InvalidRequest { tool, reason } => {
                tracing::warn!(tool = %tool, reason = %reason, "Invalid request");
                (StatusCode::BAD_REQUEST, Some(tool.clone()), None)
            }
            GatewayError::Validation { tool, violations } => {
                tracing::warn!(tool = %tool, violations = violations.len(), "Validation error");
                (StatusCode::UNPROCESSABLE_ENTITY, Some(tool.clone()), None)
            }
            GatewayError::Execution { tool, target, .. } => {
                tracing::error!(tool = %tool, target, error = %self, "Execution error");
                (StatusCode::BAD_GATEWAY, Some(tool.clone()), Some(*target))
            }
            GatewayError::Transport(msg) => {
                tracing::error!(error = %msg, "Transport error");
                (StatusCode::BAD_GATEWAY, None, None)
            }
            GatewayError::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, None, None)
            }
            GatewayError::Registration(msg)
            | GatewayError::Model(msg)
            | GatewayError::Index(msg)
            | GatewayError::Config(msg) => {
                tracing::error!(error = %msg, kind = self.kind(), "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, None, None)
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
            kind: self.kind(),
            tool,
            target,
            violations: self.violations().to_vec(),
        });

        (status, body).into_response()
    }
}

impl From<ort::Error> for GatewayError {
    fn from(err: ort::Error) -> Self {
        GatewayError::Model(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let err = GatewayError::Validation {
            tool: "create_wall".to_string(),
            violations: vec![
                FieldViolation::new("height", "\"height\" is a required property"),
                FieldViolation::new("material", "\"glass\" is not one of [\"brick\",\"concrete\"]"),
            ],
        };

        let message = err.to_string();
        assert!(message.contains("create_wall"));
        assert!(message.contains("height: "));
        assert!(message.contains("material: "));
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_execution_error_keeps_source() {
        let err = GatewayError::Execution {
            tool: "create_wall".to_string(),
            target: 19723,
            source: anyhow::anyhow!("connection refused"),
        };

        assert!(err.to_string().contains("19723"));
        assert!(err.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                GatewayError::NotFound { tool: "x".into() },
                StatusCode::NOT_FOUND,
            ),
            (
                GatewayError::InvalidRequest {
                    tool: "x".into(),
                    reason: "missing target".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                GatewayError::Validation {
                    tool: "x".into(),
                    violations: vec![],
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                GatewayError::Unavailable("overloaded".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::Index("broken".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
