//! Error types for the request core.
//!
//! # Design
//! Three layers, each a `thiserror` enum:
//! - `EncodingError` is the only thing the serializer ever returns.
//! - `TransportError` covers everything the host transport reports back,
//!   including non-2xx responses, which are failures rather than successes.
//! - `PluginError` is what an action resolves to when it fails. It folds the
//!   two above together with the argument and platform errors so the
//!   dispatch boundary has exactly one failure path.
//!
//! At the boundary every `PluginError` becomes a `PluginFailure`, a flat
//! `{error, status?, kind}` object. Callers that only read `error` see the
//! same messages the original callback contract produced.

use serde::Serialize;
use thiserror::Error;

use crate::config::PluginConfig;

/// A payload could not be turned into wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct EncodingError {
    pub reason: String,
}

impl EncodingError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The generic failure used when a JSON value refuses to serialize.
    pub fn serialization_failed() -> Self {
        Self::new("serialization failed")
    }
}

/// Failures reported by (or derived from) the host transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A response arrived, but its status is outside 2xx.
    #[error("response status code does not indicate success: {status}{}", reason_suffix(.reason))]
    Status { status: u16, reason: Option<String> },

    /// The request was cancelled through the registry before it completed.
    #[error("request was aborted")]
    Aborted,

    /// The transport could not complete the round-trip. An empty message is
    /// replaced by the configured fallback during normalization.
    #[error("{0}")]
    Network(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) if !r.is_empty() => format!(" ({r})"),
        _ => String::new(),
    }
}

/// Why an action failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("failed serializing data: {0}")]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The action exists in the plugin contract but this platform cannot
    /// provide it.
    #[error("function \"{function}\" not supported on {platform} platform")]
    Unsupported { function: String, platform: String },

    #[error("unknown action \"{0}\"")]
    UnknownAction(String),

    /// The argument list did not have the shape the action expects.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Coarse discriminant carried next to the message in `PluginFailure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Encoding,
    Transport,
    Unsupported,
    InvalidArgument,
}

/// The normalized failure shape handed to the failure callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub kind: FailureKind,
}

impl PluginError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PluginError::Encoding(_) => FailureKind::Encoding,
            PluginError::Transport(_) => FailureKind::Transport,
            PluginError::Unsupported { .. } | PluginError::UnknownAction(_) => {
                FailureKind::Unsupported
            }
            PluginError::InvalidArgument(_) => FailureKind::InvalidArgument,
        }
    }

    /// Render the error into the boundary shape, prefixing messages the same
    /// way the rest of the plugin does.
    pub fn into_failure(self, config: &PluginConfig) -> PluginFailure {
        let kind = self.kind();
        let status = match &self {
            PluginError::Transport(TransportError::Status { status, .. }) => Some(*status),
            _ => None,
        };
        let error = match &self {
            PluginError::Transport(TransportError::Network(msg)) if msg.trim().is_empty() => {
                config.fallback_error.clone()
            }
            // Transport messages come from the host and are passed through.
            PluginError::Transport(TransportError::Network(msg)) => msg.clone(),
            // The encoding reason is for logs; callers get the stable message.
            PluginError::Encoding(_) => config.prefixed("failed serializing data"),
            other => config.prefixed(&other.to_string()),
        };
        PluginFailure {
            error,
            status,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_message_names_function_and_platform() {
        let err = PluginError::Unsupported {
            function: "uploadFile".to_string(),
            platform: "windows".to_string(),
        };
        let failure = err.into_failure(&PluginConfig::default());
        assert_eq!(
            failure.error,
            "advanced-http: function \"uploadFile\" not supported on windows platform"
        );
        assert_eq!(failure.kind, FailureKind::Unsupported);
        assert!(failure.status.is_none());
    }

    #[test]
    fn empty_network_message_falls_back() {
        let err = PluginError::from(TransportError::Network(String::new()));
        let failure = err.into_failure(&PluginConfig::default());
        assert_eq!(
            failure.error,
            "advanced-http: please check console for error messages"
        );
    }

    #[test]
    fn network_message_passes_through() {
        let err = PluginError::from(TransportError::Network("connection refused".into()));
        let failure = err.into_failure(&PluginConfig::default());
        assert_eq!(failure.error, "connection refused");
        assert_eq!(failure.kind, FailureKind::Transport);
    }

    #[test]
    fn status_failure_carries_status() {
        let err = PluginError::from(TransportError::Status {
            status: 404,
            reason: Some("Not Found".into()),
        });
        let failure = err.into_failure(&PluginConfig::default());
        assert_eq!(failure.status, Some(404));
        assert_eq!(
            failure.error,
            "advanced-http: response status code does not indicate success: 404 (Not Found)"
        );
    }

    #[test]
    fn encoding_failure_uses_stable_message() {
        let err = PluginError::from(EncodingError::serialization_failed());
        let failure = err.into_failure(&PluginConfig::default());
        assert_eq!(failure.error, "advanced-http: failed serializing data");
        assert_eq!(failure.kind, FailureKind::Encoding);
    }

    #[test]
    fn failure_serializes_without_absent_status() {
        let failure = PluginFailure {
            error: "boom".into(),
            status: None,
            kind: FailureKind::Transport,
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json, serde_json::json!({"error": "boom", "kind": "transport"}));
    }
}
