//! Request lifecycle: from decoded arguments to a registered send, and from
//! the transport's outcome back to a normalized reply.
//!
//! # Design
//! The lifecycle is split around the one suspension point, the transport
//! round-trip:
//! - `begin` serializes the body, applies headers and registers a handle
//!   under the request id. The request is `Pending` from here on.
//! - `finish` resolves the id first and only then normalizes the outcome,
//!   so an abort that arrives after the terminal event is a harmless
//!   `aborted: false`.
//!
//! Everything here is synchronous. `HttpPlugin` drives it with an async
//! transport; the FFI crate drives it from a C host that does its own I/O.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::args::{abort_request_id, Action, CallOptions};
use crate::config::PluginConfig;
use crate::error::{PluginError, PluginFailure, TransportError};
use crate::headers::{apply_headers, reject_non_string, HeaderRejection};
use crate::http::{HttpRequest, RequestId, TransportResponse};
use crate::registry::{AbortOutcome, RequestHandle, RequestRegistry};
use crate::types::{HttpSuccess, PluginReply};

/// A request that has been built and registered but not yet completed.
#[derive(Debug)]
pub struct PendingRequest {
    pub request: HttpRequest,
    pub handle: RequestHandle,
    pub rejected_headers: Vec<HeaderRejection>,
}

/// What an action turned into once its arguments were decoded.
#[derive(Debug)]
pub enum Dispatch {
    /// A request is registered and must now be sent, then passed to `finish`.
    Send(PendingRequest),
    /// The action resolved without any I/O.
    Reply(Result<PluginReply, PluginFailure>),
}

#[derive(Debug, Clone, Default)]
pub struct RequestLifecycle {
    registry: Arc<RequestRegistry>,
    config: PluginConfig,
}

impl RequestLifecycle {
    pub fn new(config: PluginConfig) -> Self {
        Self::with_registry(Arc::new(RequestRegistry::new()), config)
    }

    pub fn with_registry(registry: Arc<RequestRegistry>, config: PluginConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Route one plugin action.
    pub fn dispatch(&self, action: &str, args: &[Value]) -> Dispatch {
        let action = match action.parse::<Action>() {
            Ok(action) => action,
            Err(e) => return Dispatch::Reply(Err(self.failure(e))),
        };
        match action {
            Action::Abort => {
                let outcome = match abort_request_id(args) {
                    Ok(id) => self.abort(id),
                    Err(e) => {
                        // Abort never fails; a bad id simply matches nothing.
                        tracing::warn!(error = %e, "abort called without a usable request id");
                        AbortOutcome { aborted: false }
                    }
                };
                Dispatch::Reply(Ok(PluginReply::Abort(outcome)))
            }
            Action::Unsupported(function) => Dispatch::Reply(Err(self.failure(PluginError::Unsupported {
                function: function.to_string(),
                platform: self.config.platform.clone(),
            }))),
            Action::Request(method) => {
                match CallOptions::from_args(method, args).and_then(|call| self.begin(call)) {
                    Ok(pending) => Dispatch::Send(pending),
                    Err(e) => Dispatch::Reply(Err(self.failure(e))),
                }
            }
        }
    }

    /// Build the request for `call` and register it as pending.
    pub fn begin(&self, call: CallOptions) -> Result<PendingRequest, PluginError> {
        let (request, rejected_headers) = build_request(call)?;
        let handle = RequestHandle::new();
        self.registry.register(request.request_id, handle.clone());
        tracing::debug!(
            request_id = %request.request_id,
            method = %request.method,
            url = %request.url,
            "request pending"
        );
        Ok(PendingRequest {
            request,
            handle,
            rejected_headers,
        })
    }

    /// Terminal transition for request `id`, sent under `handle`. The
    /// registry entry is removed before the outcome is looked at, and only if
    /// the id still maps to `handle`.
    pub fn finish(
        &self,
        id: RequestId,
        handle: &RequestHandle,
        original_url: &str,
        outcome: Result<TransportResponse, TransportError>,
    ) -> Result<HttpSuccess, PluginError> {
        if self.registry.resolve_handle(id, handle).is_none() {
            tracing::debug!(request_id = %id, "request id no longer registered to this send");
        }
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(request_id = %id, error = %e, "request failed");
                return Err(e.into());
            }
        };
        if !(200..300).contains(&response.status) {
            tracing::debug!(request_id = %id, status = response.status, "request failed with status");
            return Err(TransportError::Status {
                status: response.status,
                reason: response.reason,
            }
            .into());
        }
        tracing::debug!(request_id = %id, status = response.status, "request succeeded");
        Ok(normalize_success(original_url, response))
    }

    pub fn abort(&self, id: RequestId) -> AbortOutcome {
        self.registry.cancel(id)
    }

    pub fn failure(&self, error: PluginError) -> PluginFailure {
        error.into_failure(&self.config)
    }
}

/// Serialize the payload and apply headers, without registering anything.
pub fn build_request(call: CallOptions) -> Result<(HttpRequest, Vec<HeaderRejection>), PluginError> {
    let body = call.payload.serialize()?;
    let mut request = HttpRequest {
        request_id: call.request_id,
        method: call.method,
        url: call.url,
        headers: Vec::new(),
        body,
        options: call.options,
    };

    let mut rejected = Vec::new();
    let mut headers = Vec::with_capacity(call.headers.len());
    for (name, value) in call.headers {
        match value {
            Value::String(value) => headers.push((name, value)),
            _ if name.eq_ignore_ascii_case("content-type") => {}
            _ => rejected.push(reject_non_string(&request, &name)),
        }
    }
    rejected.extend(apply_headers(&mut request, &headers));
    Ok((request, rejected))
}

fn normalize_success(original_url: &str, response: TransportResponse) -> HttpSuccess {
    let url = match response.header("location") {
        Some(location) => resolve_location(original_url, location),
        None => original_url.to_string(),
    };

    let mut headers = Map::new();
    for (name, value) in response.headers {
        if let Some(Value::String(existing)) = headers.get_mut(&name) {
            existing.push_str(", ");
            existing.push_str(&value);
            continue;
        }
        headers.insert(name, Value::String(value));
    }

    HttpSuccess {
        url,
        status: response.status,
        data: String::from_utf8_lossy(&response.body).into_owned(),
        headers,
    }
}

// Relative locations are resolved against the request URL.
fn resolve_location(original_url: &str, location: &str) -> String {
    url::Url::parse(original_url)
        .and_then(|base| base.join(location))
        .map(String::from)
        .unwrap_or_else(|_| location.to_string())
}
