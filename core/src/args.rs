//! Decoding of the plugin's positional argument lists.
//!
//! Hosts call every action with a JSON array. The layout depends on the
//! action:
//!
//! | action                 | arguments |
//! |------------------------|-----------|
//! | `get` `head` `delete`  | url, headers, timeout, followRedirect, responseType, reqId |
//! | `post` `put` `patch`   | url, data, serializer, headers, timeout, followRedirect, responseType, reqId |
//! | `abort`                | reqId |
//!
//! A bad url, header map or reqId is `PluginError::InvalidArgument`; payloads
//! that cannot be turned into a body for the chosen serializer are
//! `PluginError::Encoding`. The pass-through options (timeout, followRedirect,
//! responseType) never fail a request: unusable values keep their defaults.

use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;

use crate::error::{EncodingError, PluginError};
use crate::http::{HttpMethod, RequestId, TransportOptions};
use crate::serializer::{FormValue, MultipartField, Payload, SerializerKind};

/// Actions the platform cannot provide. They always fail.
pub const UNSUPPORTED_ACTIONS: [&str; 5] = [
    "uploadFile",
    "uploadFiles",
    "downloadFile",
    "setServerTrustMode",
    "setClientAuthMode",
];

/// A decoded action name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Request(HttpMethod),
    Abort,
    Unsupported(&'static str),
}

impl FromStr for Action {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "abort" {
            return Ok(Action::Abort);
        }
        if let Some(name) = UNSUPPORTED_ACTIONS.iter().find(|name| **name == s) {
            return Ok(Action::Unsupported(*name));
        }
        // Only the lowercase spellings are part of the plugin contract.
        match s {
            "get" | "head" | "delete" | "post" | "put" | "patch" => s
                .parse()
                .map(Action::Request)
                .map_err(PluginError::UnknownAction),
            other => Err(PluginError::UnknownAction(other.to_string())),
        }
    }
}

/// Everything needed to issue one request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOptions {
    pub method: HttpMethod,
    pub url: String,
    pub payload: Payload,
    /// Caller headers as given. Non-string values are skipped when the
    /// request is built.
    pub headers: Vec<(String, Value)>,
    pub options: TransportOptions,
    pub request_id: RequestId,
}

impl CallOptions {
    pub fn new(method: HttpMethod, url: impl Into<String>, request_id: RequestId) -> Self {
        Self {
            method,
            url: url.into(),
            payload: Payload::None,
            headers: Vec::new(),
            options: TransportOptions::default(),
            request_id,
        }
    }

    /// Decode the positional argument list for `method`.
    pub fn from_args(method: HttpMethod, args: &[Value]) -> Result<Self, PluginError> {
        let url = match args.first() {
            Some(Value::String(url)) => url.clone(),
            _ => return Err(invalid("url must be a string")),
        };

        // Index of the first argument after the payload pair.
        let rest = if method.has_body() { 3 } else { 1 };
        let headers = decode_headers(arg(args, rest))?;
        let options = decode_options(&url, &args[rest.min(args.len())..]);
        let request_id = decode_request_id(arg(args, rest + 4))?;

        let payload = if method.has_body() {
            let kind = match arg(args, 2) {
                Value::String(s) => s.parse::<SerializerKind>()?,
                _ => return Err(invalid("serializer must be a string")),
            };
            decode_payload(kind, arg(args, 1))?
        } else {
            Payload::None
        };

        Ok(Self {
            method,
            url,
            payload,
            headers,
            options,
            request_id,
        })
    }
}

/// Decode the single argument of `abort`.
pub fn abort_request_id(args: &[Value]) -> Result<RequestId, PluginError> {
    decode_request_id(arg(args, 0))
}

/// Turn the raw `data` argument into a payload for `kind`.
pub fn decode_payload(kind: SerializerKind, data: &Value) -> Result<Payload, EncodingError> {
    match kind {
        SerializerKind::Json => Ok(Payload::Json(data.clone())),
        SerializerKind::Utf8 => match data.get("text") {
            Some(Value::String(text)) => Ok(Payload::Text(text.clone())),
            _ => Err(EncodingError::new("utf8 payload must be an object with a string \"text\"")),
        },
        SerializerKind::UrlEncoded => match data {
            Value::Null => Ok(Payload::Form(None)),
            Value::Object(map) => {
                let fields = map
                    .iter()
                    .map(|(key, value)| (key.clone(), form_value(value)))
                    .collect();
                Ok(Payload::Form(Some(fields)))
            }
            _ => Err(EncodingError::new("urlencoded payload must be an object or null")),
        },
        SerializerKind::Multipart => decode_multipart(data).map(Payload::Multipart),
        SerializerKind::Raw => match data {
            Value::String(s) => Ok(Payload::Raw(s.as_bytes().to_vec())),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| EncodingError::new("raw payload bytes must be 0-255"))
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(Payload::Raw),
            _ => Err(EncodingError::new("raw payload must be a string or byte array")),
        },
    }
}

fn decode_multipart(data: &Value) -> Result<Vec<MultipartField>, EncodingError> {
    let Value::Object(map) = data else {
        return Err(EncodingError::new("multipart payload must be an object"));
    };
    let buffers = string_list(map.get("buffers"), "buffers")?;
    let names = string_list(map.get("names"), "names")?;
    let file_names = optional_string_list(map.get("fileNames"), "fileNames")?;
    let types = optional_string_list(map.get("types"), "types")?;

    let count = buffers.len();
    let lengths_match = names.len() == count
        && file_names.as_ref().is_none_or(|f| f.len() == count)
        && types.as_ref().is_none_or(|t| t.len() == count);
    if !lengths_match {
        return Err(EncodingError::new("multipart payload arrays differ in length"));
    }

    (0..count)
        .map(|i| {
            let file_name = file_names.as_ref().and_then(|f| f[i].clone());
            let mime_type = types.as_ref().and_then(|t| t[i].clone());
            MultipartField::from_base64(names[i].clone(), file_name, mime_type, &buffers[i])
        })
        .collect()
}

fn string_list(value: Option<&Value>, field: &str) -> Result<Vec<String>, EncodingError> {
    let malformed = || EncodingError::new(format!("multipart \"{field}\" must be an array of strings"));
    let Some(Value::Array(items)) = value else {
        return Err(malformed());
    };
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(malformed))
        .collect()
}

fn optional_string_list(
    value: Option<&Value>,
    field: &str,
) -> Result<Option<Vec<Option<String>>>, EncodingError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => Ok(None),
                Value::String(s) => Ok(Some(s.clone())),
                _ => Err(EncodingError::new(format!(
                    "multipart \"{field}\" entries must be strings or null"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(EncodingError::new(format!("multipart \"{field}\" must be an array"))),
    }
}

fn form_value(value: &Value) -> FormValue {
    match value {
        Value::Null => FormValue::Null,
        Value::Array(items) => FormValue::List(items.iter().map(scalar_text).collect()),
        other => FormValue::Scalar(scalar_text(other)),
    }
}

// How a loosely typed value reads once it is put into a form field.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decode_headers(value: &Value) -> Result<Vec<(String, Value)>, PluginError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        _ => Err(invalid("headers must be an object")),
    }
}

// Timeout, redirect flag and response type only pass through to the
// transport. A value of the wrong type falls back to the default.
fn decode_options(url: &str, rest: &[Value]) -> TransportOptions {
    let mut options = TransportOptions::default();
    match arg(rest, 1) {
        Value::Null => {}
        value => match value.as_f64().and_then(|secs| Duration::try_from_secs_f64(secs).ok()) {
            Some(timeout) => options.timeout = Some(timeout),
            None => tracing::warn!(%url, %value, "ignoring unusable timeout"),
        },
    }
    match arg(rest, 2) {
        Value::Null => {}
        Value::Bool(follow) => options.follow_redirect = *follow,
        value => tracing::warn!(%url, %value, "ignoring non-boolean followRedirect"),
    }
    match arg(rest, 3) {
        Value::Null => {}
        Value::String(response_type) => options.response_type = response_type.clone(),
        value => tracing::warn!(%url, %value, "ignoring non-string responseType"),
    }
    options
}

fn decode_request_id(value: &Value) -> Result<RequestId, PluginError> {
    value
        .as_i64()
        .map(RequestId)
        .ok_or_else(|| invalid("reqId must be an integer"))
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Null)
}

fn invalid(message: &str) -> PluginError {
    PluginError::InvalidArgument(message.to_string())
}
