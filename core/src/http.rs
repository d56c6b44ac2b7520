//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe requests and responses as plain data. The core
//! builds `HttpRequest` values and normalizes `TransportResponse` values
//! without touching the network; the host transport performs the actual
//! round-trip.
//!
//! All fields use owned types (`String`, `Vec`) so values can cross FFI
//! boundaries without lifetime concerns.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::serializer::SerializedBody;

/// Caller-assigned identifier of one in-flight request.
///
/// The core never generates ids; uniqueness among outstanding requests is the
/// caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId(id)
    }
}

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Delete,
    Post,
    Put,
    Patch,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Whether the plugin's argument list for this method carries a payload.
    pub fn has_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "head" => Ok(HttpMethod::Head),
            "delete" => Ok(HttpMethod::Delete),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "patch" => Ok(HttpMethod::Patch),
            other => Err(other.to_string()),
        }
    }
}

/// Options the core does not act on itself but hands to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOptions {
    pub timeout: Option<Duration>,
    pub follow_redirect: bool,
    pub response_type: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            follow_redirect: true,
            response_type: "text".to_string(),
        }
    }
}

/// An HTTP request described as plain data.
///
/// `headers` never contains a `Content-Type` entry; the content type belongs
/// to `body` and is read from `SerializedBody::content_type`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub request_id: RequestId,
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<SerializedBody>,
    pub options: TransportOptions,
}

impl HttpRequest {
    pub fn new(request_id: RequestId, method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            request_id,
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            options: TransportOptions::default(),
        }
    }

    /// The full `Content-Type` value for this request, if it has a body.
    pub fn content_type(&self) -> Option<String> {
        self.body.as_ref().map(SerializedBody::content_type)
    }
}

/// What the transport hands back after a completed round-trip.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    /// Reason phrase, when the transport exposes one.
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
