//! Request core for a native-HTTP plugin.
//!
//! # Overview
//! Turns the plugin's generic call arguments into plain-data HTTP requests,
//! tracks them while the host transport runs them, and turns the outcome
//! back into the plugin's success/failure contract. The core never touches
//! the network (host-does-IO pattern).
//!
//! # Design
//! - `serializer` encodes JSON, plain-text, URL-encoded, raw and multipart
//!   payloads; its only error is `EncodingError`.
//! - `headers` applies caller headers best-effort; `Content-Type` always
//!   comes from the serialized body.
//! - `registry` maps caller-assigned request ids to cancellable handles.
//! - `lifecycle` is the synchronous begin/finish pair around the transport
//!   round-trip; `plugin` drives it with an async `Transport`.
//! - Types use owned `String` / `Vec` fields so the FFI crate can map them
//!   directly.

pub mod args;
pub mod config;
pub mod error;
pub mod headers;
pub mod http;
pub mod lifecycle;
pub mod plugin;
pub mod registry;
pub mod serializer;
pub mod transport;
pub mod types;

pub use args::{Action, CallOptions};
pub use config::PluginConfig;
pub use error::{EncodingError, FailureKind, PluginError, PluginFailure, TransportError};
pub use headers::{apply_headers, HeaderRejection};
pub use http::{HttpMethod, HttpRequest, RequestId, TransportOptions, TransportResponse};
pub use lifecycle::{Dispatch, PendingRequest, RequestLifecycle};
pub use plugin::HttpPlugin;
pub use registry::{AbortOutcome, RequestHandle, RequestRegistry};
pub use serializer::{FormFields, FormValue, MultipartField, Payload, SerializedBody, SerializerKind};
pub use transport::Transport;
pub use types::{HttpSuccess, PluginReply};
