//! Async plugin front end.
//!
//! `HttpPlugin` pairs a `RequestLifecycle` with a `Transport` and runs each
//! action to completion. Requests are independent futures; the only shared
//! state between them is the registry.

use std::sync::Arc;

use serde_json::Value;

use crate::args::CallOptions;
use crate::config::PluginConfig;
use crate::error::{PluginError, PluginFailure, TransportError};
use crate::http::RequestId;
use crate::lifecycle::{Dispatch, PendingRequest, RequestLifecycle};
use crate::registry::{AbortOutcome, RequestHandle, RequestRegistry};
use crate::transport::Transport;
use crate::types::{HttpSuccess, PluginReply};

#[derive(Debug)]
pub struct HttpPlugin<T> {
    transport: T,
    lifecycle: RequestLifecycle,
}

impl<T: Transport> HttpPlugin<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, PluginConfig::default())
    }

    pub fn with_config(transport: T, config: PluginConfig) -> Self {
        Self {
            transport,
            lifecycle: RequestLifecycle::new(config),
        }
    }

    pub fn lifecycle(&self) -> &RequestLifecycle {
        &self.lifecycle
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        self.lifecycle.registry()
    }

    /// Run one action with its positional arguments.
    ///
    /// Resolves exactly once, to the reply for the success callback or the
    /// failure for the failure callback.
    pub async fn exec(&self, action: &str, args: &[Value]) -> Result<PluginReply, PluginFailure> {
        match self.lifecycle.dispatch(action, args) {
            Dispatch::Reply(reply) => reply,
            Dispatch::Send(pending) => self
                .complete(pending)
                .await
                .map(PluginReply::Http)
                .map_err(|e| self.lifecycle.failure(e)),
        }
    }

    /// `exec`, delivered through the host's callback pair. Exactly one of the
    /// two callbacks is invoked.
    pub async fn exec_with_callbacks<S, F>(&self, action: &str, args: &[Value], on_success: S, on_failure: F)
    where
        S: FnOnce(Value),
        F: FnOnce(Value),
    {
        // Both shapes only have string keys, so conversion cannot fail.
        match self.exec(action, args).await {
            Ok(reply) => on_success(serde_json::to_value(&reply).unwrap_or_default()),
            Err(failure) => on_failure(serde_json::to_value(&failure).unwrap_or_default()),
        }
    }

    /// Send an already-decoded request.
    pub async fn send(&self, call: CallOptions) -> Result<HttpSuccess, PluginError> {
        let pending = self.lifecycle.begin(call)?;
        self.complete(pending).await
    }

    pub fn abort(&self, id: RequestId) -> AbortOutcome {
        self.lifecycle.abort(id)
    }

    async fn complete(&self, pending: PendingRequest) -> Result<HttpSuccess, PluginError> {
        let PendingRequest { request, handle, .. } = pending;
        let id = request.request_id;
        let url = request.url.clone();
        let _registration = Registration {
            registry: self.registry(),
            id,
            handle: handle.clone(),
        };

        // Losing the race drops the transport future, which is the abort.
        let outcome = tokio::select! {
            biased;
            _ = handle.cancelled() => Err(TransportError::Aborted),
            result = self.transport.send(request) => result,
        };
        self.lifecycle.finish(id, &handle, &url, outcome)
    }
}

/// Releases the registry entry of a send whose future is dropped before it
/// reaches `finish`. After `finish` the entry is already gone and this is a
/// no-op.
struct Registration<'a> {
    registry: &'a RequestRegistry,
    id: RequestId,
    handle: RequestHandle,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.registry.resolve_handle(self.id, &self.handle).is_some() {
            tracing::debug!(request_id = %self.id, "send dropped before completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::http::{HttpMethod, HttpRequest, TransportResponse};
    use serde_json::json;
    use std::future::Future;
    use std::sync::Mutex;

    /// Echoes the request body back. URLs containing `/slow` never complete,
    /// and `/status/<code>` answers with that code.
    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl Transport for FakeTransport {
        fn send(
            &self,
            request: HttpRequest,
        ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send {
            self.sent.lock().unwrap().push(request.clone());
            async move {
                if request.url.contains("/slow") {
                    std::future::pending::<()>().await;
                }
                if request.url.contains("/offline") {
                    return Err(TransportError::Network(String::new()));
                }
                let status = request
                    .url
                    .rsplit_once("/status/")
                    .and_then(|(_, code)| code.parse().ok())
                    .unwrap_or(200);
                let mut headers = vec![("X-Method".to_string(), request.method.to_string())];
                if let Some(content_type) = request.content_type() {
                    headers.push(("X-Content-Type".to_string(), content_type));
                }
                Ok(TransportResponse {
                    status,
                    reason: None,
                    headers,
                    body: request.body.map(|b| b.bytes).unwrap_or_default(),
                })
            }
        }
    }

    fn bodyless(url: &str, id: i64) -> Vec<Value> {
        vec![json!(url), json!({}), json!(null), json!(true), json!("text"), json!(id)]
    }

    fn with_body(url: &str, data: Value, serializer: &str, headers: Value, id: i64) -> Vec<Value> {
        vec![
            json!(url),
            data,
            json!(serializer),
            headers,
            json!(null),
            json!(true),
            json!("text"),
            json!(id),
        ]
    }

    fn http(reply: PluginReply) -> HttpSuccess {
        match reply {
            PluginReply::Http(success) => success,
            other => panic!("expected http reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn post_json_round_trips_body_and_content_type() {
        let plugin = HttpPlugin::new(FakeTransport::default());
        let reply = plugin
            .exec(
                "post",
                &with_body("http://h/echo", json!({"a": [1, 2]}), "json", json!({"Content-Type": "text/xml"}), 1),
            )
            .await
            .unwrap();
        let success = http(reply);
        assert_eq!(success.data, r#"{"a":[1,2]}"#);
        assert_eq!(success.headers["X-Content-Type"], json!("application/json; charset=utf-8"));
        assert_eq!(success.headers["X-Method"], json!("POST"));

        let sent = plugin.transport.sent.lock().unwrap();
        assert!(sent[0].headers.is_empty());
    }

    #[tokio::test]
    async fn urlencoded_post_sends_form_body() {
        let plugin = HttpPlugin::new(FakeTransport::default());
        let reply = plugin
            .exec(
                "put",
                &with_body("http://h/echo", json!({"q": "a b", "ids": [1, 2]}), "urlencoded", json!({}), 2),
            )
            .await
            .unwrap();
        assert_eq!(http(reply).data, "q=a%20b&ids[]=1&ids[]=2");
    }

    #[tokio::test]
    async fn status_404_goes_to_failure() {
        let plugin = HttpPlugin::new(FakeTransport::default());
        let failure = plugin
            .exec("get", &bodyless("http://h/status/404", 3))
            .await
            .unwrap_err();
        assert_eq!(failure.status, Some(404));
        assert_eq!(failure.kind, FailureKind::Transport);
        assert!(plugin.registry().is_empty());
    }

    #[tokio::test]
    async fn transport_error_without_message_uses_fallback() {
        let plugin = HttpPlugin::new(FakeTransport::default());
        let failure = plugin
            .exec("head", &bodyless("http://h/offline", 4))
            .await
            .unwrap_err();
        assert_eq!(failure.error, "advanced-http: please check console for error messages");
    }

    #[tokio::test]
    async fn abort_fails_only_the_targeted_request() {
        let plugin = Arc::new(HttpPlugin::new(FakeTransport::default()));

        let slow = {
            let plugin = Arc::clone(&plugin);
            tokio::spawn(async move { plugin.exec("get", &bodyless("http://h/slow", 11)).await })
        };
        while !plugin.registry().contains(RequestId(11)) {
            tokio::task::yield_now().await;
        }

        let other = plugin.exec("delete", &bodyless("http://h/fast", 12)).await;
        assert!(other.is_ok());

        let aborted = plugin.exec("abort", &[json!(11)]).await.unwrap();
        assert_eq!(aborted, PluginReply::Abort(AbortOutcome { aborted: true }));

        let failure = slow.await.unwrap().unwrap_err();
        assert_eq!(failure.error, "advanced-http: request was aborted");
        assert!(plugin.registry().is_empty());
        assert!(!plugin.abort(RequestId(11)).aborted);
    }

    #[tokio::test]
    async fn callbacks_fire_exactly_once() {
        let plugin = HttpPlugin::new(FakeTransport::default());
        let successes = Mutex::new(Vec::new());
        let failures = Mutex::new(Vec::new());

        plugin
            .exec_with_callbacks(
                "uploadFile",
                &[],
                |v| successes.lock().unwrap().push(v),
                |v| failures.lock().unwrap().push(v),
            )
            .await;
        plugin
            .exec_with_callbacks(
                "abort",
                &[json!(1)],
                |v| successes.lock().unwrap().push(v),
                |v| failures.lock().unwrap().push(v),
            )
            .await;

        let successes = successes.into_inner().unwrap();
        let failures = failures.into_inner().unwrap();
        assert_eq!(successes, vec![json!({"aborted": false})]);
        assert_eq!(
            failures,
            vec![json!({
                "error": "advanced-http: function \"uploadFile\" not supported on windows platform",
                "kind": "unsupported"
            })]
        );
    }

    #[tokio::test]
    async fn dropped_exec_releases_its_request_id() {
        let plugin = HttpPlugin::new(FakeTransport::default());
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            plugin.exec("get", &bodyless("http://h/slow", 77)),
        )
        .await;
        assert!(timed_out.is_err());

        assert!(plugin.registry().is_empty());
        assert!(!plugin.abort(RequestId(77)).aborted);

        // The id can be used again without displacing anything.
        let reused = plugin.exec("get", &bodyless("http://h/fast", 77)).await;
        assert!(reused.is_ok());
        assert!(plugin.registry().is_empty());
    }

    #[tokio::test]
    async fn send_accepts_decoded_call() {
        let plugin = HttpPlugin::new(FakeTransport::default());
        let call = CallOptions::new(HttpMethod::Get, "http://h/x", RequestId(20));
        let success = plugin.send(call).await.unwrap();
        assert_eq!(success.url, "http://h/x");
        assert_eq!(success.status, 200);
    }
}
