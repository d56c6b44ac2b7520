//! In-flight request registry.
//!
//! # Design
//! One `RequestRegistry` per plugin instance, shared through an `Arc`. It
//! maps caller-assigned `RequestId`s to the cancellable handle of the send
//! that is currently outstanding under that id.
//!
//! Only the lifecycle removes entries (`resolve`, at the terminal event).
//! `cancel` never removes: it only signals the handle, and the send's own
//! completion path resolves the id afterwards. That split is what lets a
//! cancel and a completion race on the same id without either of them
//! removing an entry twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::http::RequestId;

/// Cancellable reference to one outstanding send.
///
/// Clones share the same cancellation state; cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct RequestHandle {
    token: Arc<CancellationToken>,
}

impl RequestHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the underlying send to stop. Safe to call any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether `other` is a clone of this handle rather than a separate send.
    pub fn same_as(&self, other: &RequestHandle) -> bool {
        Arc::ptr_eq(&self.token, &other.token)
    }

    /// Completes once `cancel` has been called on any clone of this handle.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// Result of an abort request, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbortOutcome {
    pub aborted: bool,
}

#[derive(Debug, Default)]
pub struct RequestRegistry {
    inner: Mutex<HashMap<RequestId, RequestHandle>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handle` under `id`.
    ///
    /// Ids are expected to be unique among outstanding requests. If one is
    /// reused anyway the newer handle wins and the displaced one is returned.
    pub fn register(&self, id: RequestId, handle: RequestHandle) -> Option<RequestHandle> {
        let displaced = self.lock().insert(id, handle);
        if displaced.is_some() {
            tracing::warn!(request_id = %id, "request id registered twice; replacing older handle");
        }
        displaced
    }

    /// Remove and return the handle for `id`, if any.
    pub fn resolve(&self, id: RequestId) -> Option<RequestHandle> {
        self.lock().remove(&id)
    }

    /// Remove the entry for `id` only if it still belongs to `handle`.
    ///
    /// A send that completes after its id was registered again must not take
    /// the newer send's entry with it.
    pub fn resolve_handle(&self, id: RequestId, handle: &RequestHandle) -> Option<RequestHandle> {
        let mut guard = self.lock();
        match guard.get(&id) {
            Some(current) if current.same_as(handle) => guard.remove(&id),
            _ => None,
        }
    }

    /// Request cancellation of the send registered under `id`.
    ///
    /// `aborted: true` means cancellation was requested, not that the send
    /// stopped before completing. Unknown or finished ids report `false`.
    pub fn cancel(&self, id: RequestId) -> AbortOutcome {
        let guard = self.lock();
        match guard.get(&id) {
            Some(handle) => {
                handle.cancel();
                tracing::info!(request_id = %id, "abort requested");
                AbortOutcome { aborted: true }
            }
            None => {
                tracing::debug!(request_id = %id, "abort for unknown request id");
                AbortOutcome { aborted: false }
            }
        }
    }

    /// Whether the send under `id` has been asked to stop. Unknown ids are
    /// reported as not cancelled.
    pub fn is_cancelled(&self, id: RequestId) -> bool {
        self.lock().get(&id).is_some_and(RequestHandle::is_cancelled)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The map is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, RequestHandle>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
