//! Best-effort header application.
//!
//! A single bad header must not stop a request from going out, so every
//! header is validated on its own; rejects are logged, collected and skipped.
//! `Content-Type` is never copied from the caller's set because the body
//! serializer owns it.

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};

use crate::http::HttpRequest;

/// A header that was left off the request, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRejection {
    pub name: String,
    pub reason: String,
}

/// Attach `headers` to `request`, skipping `Content-Type` and anything the
/// transport would refuse. Returns the headers that were skipped for being
/// invalid; the suppressed `Content-Type` is not reported.
pub fn apply_headers(request: &mut HttpRequest, headers: &[(String, String)]) -> Vec<HeaderRejection> {
    let mut rejected = Vec::new();
    for (name, value) in headers {
        if name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
            continue;
        }
        match validate(name, value) {
            Ok(()) => request.headers.push((name.clone(), value.clone())),
            Err(reason) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    header = %name,
                    %reason,
                    "error setting header, skipping it"
                );
                rejected.push(HeaderRejection {
                    name: name.clone(),
                    reason,
                });
            }
        }
    }
    rejected
}

/// Record a header that never made it to `apply_headers` because its value
/// was not a string.
pub(crate) fn reject_non_string(request: &HttpRequest, name: &str) -> HeaderRejection {
    let reason = "header value is not a string".to_string();
    tracing::warn!(
        request_id = %request.request_id,
        header = %name,
        %reason,
        "error setting header, skipping it"
    );
    HeaderRejection {
        name: name.to_string(),
        reason,
    }
}

fn validate(name: &str, value: &str) -> Result<(), String> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| format!("invalid header name: {e}"))?;
    HeaderValue::from_str(value).map_err(|e| format!("invalid header value: {e}"))?;
    Ok(())
}
