//! C-ABI wrapper around `native-http-core`.
//!
//! # Overview
//! Exposes the request lifecycle through `extern "C"` functions so a host
//! with its own HTTP stack (WinRT, libcurl, ...) can drive the plugin
//! without linking to an async runtime. The host owns all I/O:
//!
//! 1. `nh_plugin_begin` decodes the action and its JSON argument array.
//!    Either the action resolves immediately (`reply`), or a request is
//!    registered and handed back for the host to send (`request`).
//! 2. The host sends it and reports back with `nh_plugin_complete` (a
//!    response arrived) or `nh_plugin_fail` (no response).
//! 3. An `abort` action started from another thread cancels the registry
//!    entry; the host can poll `nh_plugin_is_cancelled` to stop early.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Replies carry the exact JSON value for the host's success or failure
//!   callback.
//! - The C caller owns all returned pointers and must call the matching
//!   `nh_free_*` function to release them.

pub mod types;

use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use native_http_core::{
    Dispatch, PluginConfig, PluginError, PluginReply, RequestId, RequestLifecycle, TransportError,
    TransportResponse,
};
use serde_json::Value;

use types::*;

// ---------------------------------------------------------------------------
// Plugin lifecycle
// ---------------------------------------------------------------------------

/// Create a plugin instance.
///
/// `config_json` may be null for the default configuration. Returns null if
/// the configuration does not parse or if an internal panic occurs.
/// The caller must free the returned pointer with `nh_plugin_free`.
#[unsafe(no_mangle)]
pub extern "C" fn nh_plugin_new(config_json: *const c_char) -> *mut FfiPlugin {
    catch_unwind(|| {
        let config = match unsafe { read_c_str(config_json) } {
            None => PluginConfig::default(),
            Some(raw) => match PluginConfig::from_json(&raw) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(error = %e, "rejecting plugin configuration");
                    return std::ptr::null_mut();
                }
            },
        };
        Box::into_raw(Box::new(FfiPlugin {
            inner: RequestLifecycle::new(config),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a plugin created by `nh_plugin_new`. Safe to call with null.
///
/// Requests still pending are forgotten; completing them afterwards is
/// undefined behavior because the plugin pointer is dangling.
#[unsafe(no_mangle)]
pub extern "C" fn nh_plugin_free(plugin: *mut FfiPlugin) {
    if !plugin.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(plugin) });
        });
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Start `action` with `args_json`, a JSON array of positional arguments
/// (null means no arguments).
///
/// Never returns null. The caller must free the result with
/// `nh_free_begin_result`, after it is done with `result->request`.
#[unsafe(no_mangle)]
pub extern "C" fn nh_plugin_begin(
    plugin: *const FfiPlugin,
    action: *const c_char,
    args_json: *const c_char,
) -> *mut FfiBeginResult {
    catch_unwind(|| {
        if plugin.is_null() {
            return FfiBeginResult::reply(FfiReply::null_arg("plugin"));
        }
        let plugin = unsafe { &*plugin };
        let Some(action) = (unsafe { read_c_str(action) }) else {
            return FfiBeginResult::reply(FfiReply::null_arg("action"));
        };
        let args = match unsafe { read_c_str(args_json) } {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<Value>>(&raw) {
                Ok(args) => args,
                Err(e) => {
                    let error = PluginError::InvalidArgument(format!("arguments must be a JSON array: {e}"));
                    return FfiBeginResult::reply(FfiReply::failure(&plugin.inner.failure(error)));
                }
            },
        };

        match plugin.inner.dispatch(&action, &args) {
            Dispatch::Send(pending) => {
                FfiBeginResult::send(FfiHttpRequest::from_core(pending.request, pending.handle))
            }
            Dispatch::Reply(reply) => FfiBeginResult::reply(FfiReply::from_core(reply)),
        }
    })
    .unwrap_or_else(|_| FfiBeginResult::reply(FfiReply::panic("panic in nh_plugin_begin")))
}

/// Report the response the host received for `request`.
///
/// Resolves the request id and returns the reply for the host's callback.
/// A request that was aborted while in flight fails as aborted even if a
/// response arrived.
#[unsafe(no_mangle)]
pub extern "C" fn nh_plugin_complete(
    plugin: *const FfiPlugin,
    request: *const FfiHttpRequest,
    response: *const FfiHttpResponse,
) -> *mut FfiReply {
    // The request handle is only read; a panic cannot leave it half-updated.
    catch_unwind(AssertUnwindSafe(|| {
        if plugin.is_null() {
            return FfiReply::null_arg("plugin");
        }
        if request.is_null() {
            return FfiReply::null_arg("request");
        }
        if response.is_null() {
            return FfiReply::null_arg("response");
        }
        let plugin = unsafe { &*plugin };
        let request = unsafe { &*request };
        let response = unsafe { (*response).to_core() };
        finish(&plugin.inner, request, Ok(response))
    }))
    .unwrap_or_else(|_| FfiReply::panic("panic in nh_plugin_complete"))
}

/// Report that `request` produced no response. `message` may be null, in
/// which case the configured fallback message is used.
#[unsafe(no_mangle)]
pub extern "C" fn nh_plugin_fail(
    plugin: *const FfiPlugin,
    request: *const FfiHttpRequest,
    message: *const c_char,
) -> *mut FfiReply {
    catch_unwind(AssertUnwindSafe(|| {
        if plugin.is_null() {
            return FfiReply::null_arg("plugin");
        }
        if request.is_null() {
            return FfiReply::null_arg("request");
        }
        let plugin = unsafe { &*plugin };
        let request = unsafe { &*request };
        let message = unsafe { read_c_str(message) }.unwrap_or_default();
        finish(&plugin.inner, request, Err(TransportError::Network(message)))
    }))
    .unwrap_or_else(|_| FfiReply::panic("panic in nh_plugin_fail"))
}

fn finish(
    lifecycle: &RequestLifecycle,
    request: &FfiHttpRequest,
    outcome: Result<TransportResponse, TransportError>,
) -> *mut FfiReply {
    if request.handle.is_null() {
        return FfiReply::null_arg("request.handle");
    }
    let handle = unsafe { &(*request.handle).inner };
    let id = RequestId(request.request_id);
    let url = unsafe { read_c_str(request.url) }.unwrap_or_default();
    let outcome = if handle.is_cancelled() {
        Err(TransportError::Aborted)
    } else {
        outcome
    };
    let reply = lifecycle
        .finish(id, handle, &url, outcome)
        .map(PluginReply::Http)
        .map_err(|e| lifecycle.failure(e));
    FfiReply::from_core(reply)
}

/// Whether the request registered under `request_id` has been aborted and
/// not yet completed.
#[unsafe(no_mangle)]
pub extern "C" fn nh_plugin_is_cancelled(plugin: *const FfiPlugin, request_id: i64) -> bool {
    if plugin.is_null() {
        return false;
    }
    catch_unwind(|| {
        let plugin = unsafe { &*plugin };
        plugin.inner.registry().is_cancelled(RequestId(request_id))
    })
    .unwrap_or(false)
}

/// Abort the request registered under `request_id`. Returns whether a
/// pending request was found. Same effect as the `abort` action.
#[unsafe(no_mangle)]
pub extern "C" fn nh_plugin_abort(plugin: *const FfiPlugin, request_id: i64) -> bool {
    if plugin.is_null() {
        return false;
    }
    catch_unwind(|| {
        let plugin = unsafe { &*plugin };
        plugin.inner.abort(RequestId(request_id)).aborted
    })
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiBeginResult` together with the request or reply it holds.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn nh_free_begin_result(result: *mut FfiBeginResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.request.is_null() {
            unsafe { FfiHttpRequest::free(result.request) };
        }
        if !result.reply.is_null() {
            unsafe { FfiReply::free(result.reply) };
        }
    }));
}

/// Free an `FfiReply` returned by `nh_plugin_complete` or `nh_plugin_fail`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn nh_free_reply(reply: *mut FfiReply) {
    if !reply.is_null() {
        let _ = catch_unwind(|| unsafe { FfiReply::free(reply) });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
