//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible fields: `*mut c_char`
//! for text, pointer + length for byte buffers and header lists, and enums
//! with explicit discriminants. Everything the library allocates is released
//! by the matching `nh_free_*` function; everything the host passes in is
//! only borrowed.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use native_http_core::{
    HttpMethod, HttpRequest, PluginFailure, PluginReply, RequestHandle, TransportResponse,
};
use serde_json::{json, Value};

/// Opaque handle to a `RequestLifecycle`. C callers receive a pointer to
/// this and pass it back into every FFI function.
pub struct FfiPlugin {
    pub(crate) inner: native_http_core::RequestLifecycle,
}

/// Opaque cancellation handle of one registered send. Owned by the
/// `FfiHttpRequest` that carries it.
pub struct FfiRequestHandle {
    pub(crate) inner: RequestHandle,
}

/// Copy `s` into a heap C string. Interior NULs are dropped.
pub(crate) fn c_string(s: impl Into<String>) -> *mut c_char {
    let mut s = s.into();
    s.retain(|c| c != '\0');
    CString::new(s).unwrap_or_default().into_raw()
}

/// Borrow a host C string. Invalid UTF-8 is replaced.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

pub(crate) unsafe fn free_c_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

fn boxed_slice<T>(items: Vec<T>) -> (*mut T, usize) {
    if items.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let len = items.len();
    (Box::into_raw(items.into_boxed_slice()) as *mut T, len)
}

unsafe fn free_boxed_slice<T>(ptr: *mut T, len: usize) -> Option<Box<[T]>> {
    if ptr.is_null() || len == 0 {
        return None;
    }
    Some(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)) })
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Head = 1,
    Delete = 2,
    Post = 3,
    Put = 4,
    Patch = 5,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Head => FfiHttpMethod::Head,
            HttpMethod::Delete => FfiHttpMethod::Delete,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Patch => FfiHttpMethod::Patch,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// A registered request the host must now send.
///
/// `content_type` is null exactly when `body` is null. `timeout_ms` is
/// negative when no timeout was given. `handle` ties the request to its
/// registry entry and must be left untouched by the host.
#[repr(C)]
pub struct FfiHttpRequest {
    pub request_id: i64,
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: usize,
    pub content_type: *mut c_char,
    pub body: *mut u8,
    pub body_len: usize,
    pub timeout_ms: i64,
    pub follow_redirect: bool,
    pub handle: *mut FfiRequestHandle,
}

impl FfiHttpRequest {
    pub(crate) fn from_core(req: HttpRequest, handle: RequestHandle) -> *mut Self {
        let headers = req
            .headers
            .into_iter()
            .map(|(k, v)| FfiHeader {
                key: c_string(k),
                value: c_string(v),
            })
            .collect();
        let (headers, headers_len) = boxed_slice(headers);

        let (content_type, (body, body_len)) = match req.body {
            Some(b) => (c_string(b.content_type()), boxed_slice(b.bytes)),
            None => (std::ptr::null_mut(), (std::ptr::null_mut(), 0)),
        };
        let timeout_ms = req
            .options
            .timeout
            .map(|t| i64::try_from(t.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(-1);

        Box::into_raw(Box::new(FfiHttpRequest {
            request_id: req.request_id.0,
            method: req.method.into(),
            url: c_string(req.url),
            headers,
            headers_len,
            content_type,
            body,
            body_len,
            timeout_ms,
            follow_redirect: req.options.follow_redirect,
            handle: Box::into_raw(Box::new(FfiRequestHandle { inner: handle })),
        }))
    }

    pub(crate) unsafe fn free(ptr: *mut Self) {
        let req = unsafe { Box::from_raw(ptr) };
        unsafe {
            free_c_string(req.url);
            free_c_string(req.content_type);
            if !req.handle.is_null() {
                drop(Box::from_raw(req.handle));
            }
            drop(free_boxed_slice(req.body, req.body_len));
            if let Some(headers) = free_boxed_slice(req.headers, req.headers_len) {
                for h in headers.iter() {
                    free_c_string(h.key);
                    free_c_string(h.value);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// A response header as borrowed C strings.
#[repr(C)]
pub struct FfiResponseHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// What the host's transport received.
///
/// The host builds this after executing an `FfiHttpRequest` and passes a
/// pointer to `nh_plugin_complete`. The FFI layer reads but does not free
/// these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub headers: *const FfiResponseHeader,
    pub headers_len: usize,
    pub body: *const u8,
    pub body_len: usize,
}

impl FfiHttpResponse {
    /// # Safety
    /// Pointer/length pairs must describe valid memory, and every header
    /// string must be null or NUL-terminated.
    pub(crate) unsafe fn to_core(&self) -> TransportResponse {
        let headers = if self.headers.is_null() {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(self.headers, self.headers_len) }
                .iter()
                .filter_map(|h| {
                    let key = unsafe { read_c_str(h.key) }?;
                    let value = unsafe { read_c_str(h.value) }.unwrap_or_default();
                    Some((key, value))
                })
                .collect()
        };
        let body = if self.body.is_null() {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(self.body, self.body_len) }.to_vec()
        };
        TransportResponse {
            status: self.status,
            reason: None,
            headers,
            body,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Which host callback a reply belongs to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiReplyCode {
    Success = 0,
    Failure = 1,
    NullArg = 2,
    Panic = 3,
}

/// A finished action.
///
/// `json` is the value for the success callback when `code` is `Success`,
/// and a failure object (`{"error": ...}`) for every other code.
/// `http_status` is non-zero only for failures caused by a response status.
#[repr(C)]
pub struct FfiReply {
    pub code: FfiReplyCode,
    pub http_status: u16,
    pub json: *mut c_char,
}

impl FfiReply {
    fn boxed(code: FfiReplyCode, http_status: u16, json: &Value) -> *mut Self {
        Box::into_raw(Box::new(FfiReply {
            code,
            http_status,
            json: c_string(json.to_string()),
        }))
    }

    pub(crate) fn from_core(reply: Result<PluginReply, PluginFailure>) -> *mut Self {
        match reply {
            Ok(reply) => Self::success(&reply),
            Err(failure) => Self::failure(&failure),
        }
    }

    pub(crate) fn success(reply: &PluginReply) -> *mut Self {
        let value = serde_json::to_value(reply).unwrap_or_default();
        Self::boxed(FfiReplyCode::Success, 0, &value)
    }

    pub(crate) fn failure(failure: &PluginFailure) -> *mut Self {
        let value = serde_json::to_value(failure).unwrap_or_default();
        Self::boxed(FfiReplyCode::Failure, failure.status.unwrap_or(0), &value)
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::boxed(FfiReplyCode::NullArg, 0, &json!({ "error": format!("null argument: {name}") }))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::boxed(FfiReplyCode::Panic, 0, &json!({ "error": msg }))
    }

    pub(crate) unsafe fn free(ptr: *mut Self) {
        let reply = unsafe { Box::from_raw(ptr) };
        unsafe { free_c_string(reply.json) };
    }
}

/// Outcome of `nh_plugin_begin`. Exactly one of the two pointers is
/// non-null: `request` when the host must send, `reply` when the action
/// resolved without I/O.
#[repr(C)]
pub struct FfiBeginResult {
    pub request: *mut FfiHttpRequest,
    pub reply: *mut FfiReply,
}

impl FfiBeginResult {
    pub(crate) fn send(request: *mut FfiHttpRequest) -> *mut Self {
        Box::into_raw(Box::new(FfiBeginResult {
            request,
            reply: std::ptr::null_mut(),
        }))
    }

    pub(crate) fn reply(reply: *mut FfiReply) -> *mut Self {
        Box::into_raw(Box::new(FfiBeginResult {
            request: std::ptr::null_mut(),
            reply,
        }))
    }
}
