//! Result DTOs handed to the host's success callback.
//!
//! # Design
//! Field names match what plugin callers already read (`url`, `status`,
//! `data`, `headers`, `aborted`), so the serialized form can be passed to the
//! host unchanged.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::registry::AbortOutcome;

/// Normalized result of a successful (2xx) request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpSuccess {
    /// The redirect location when the response carried one, otherwise the
    /// URL the request was sent to.
    pub url: String,
    pub status: u16,
    /// Response body decoded as UTF-8 (lossily).
    pub data: String,
    /// Response headers; repeated names are joined with `", "`.
    pub headers: Map<String, Value>,
}

/// What a successful action resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PluginReply {
    Http(HttpSuccess),
    Abort(AbortOutcome),
}
