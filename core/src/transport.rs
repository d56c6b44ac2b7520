//! The seam to the host's HTTP client.

use std::future::Future;

use crate::error::TransportError;
use crate::http::{HttpRequest, TransportResponse};

/// Performs one HTTP round-trip on behalf of the plugin.
///
/// Implementations own connection handling, TLS, redirects and timeouts
/// (`HttpRequest::options` carries the caller's wishes for the last two).
/// The plugin cancels a send by dropping the returned future, so an
/// implementation should release whatever it holds for the request on drop.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}
