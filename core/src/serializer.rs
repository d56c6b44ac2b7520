//! Request-body serializers.
//!
//! # Design
//! Pure functions from a logical payload to wire bytes plus the content-type
//! metadata that goes with them. Nothing here knows about requests, ids or
//! networking, and every failure is an `EncodingError` so callers have a
//! single error path to handle.
//!
//! The URL-encoded serializer follows browser `encodeURIComponent` rules:
//! only `A-Z a-z 0-9 - _ . ! ~ * ' ( )` are left as-is.

use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::error::EncodingError;

const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const UTF8: &str = "utf-8";

/// Which serializer the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerKind {
    Json,
    Utf8,
    UrlEncoded,
    Multipart,
    Raw,
}

impl FromStr for SerializerKind {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(SerializerKind::Json),
            "utf8" => Ok(SerializerKind::Utf8),
            "urlencoded" => Ok(SerializerKind::UrlEncoded),
            "multipart" => Ok(SerializerKind::Multipart),
            "raw" => Ok(SerializerKind::Raw),
            other => Err(EncodingError::new(format!("unsupported serializer \"{other}\""))),
        }
    }
}

/// One value in a URL-encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Null,
    Scalar(String),
    List(Vec<String>),
}

/// Ordered form fields. Output pairs follow this order.
pub type FormFields = Vec<(String, FormValue)>;

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartField {
    pub name: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl MultipartField {
    /// Build a part from its base64 transport encoding.
    pub fn from_base64(
        name: impl Into<String>,
        file_name: Option<String>,
        mime_type: Option<String>,
        encoded: &str,
    ) -> Result<Self, EncodingError> {
        let name = name.into();
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| EncodingError::new(format!("invalid base64 in part \"{name}\": {e}")))?;
        Ok(Self {
            name,
            file_name,
            mime_type,
            bytes,
        })
    }
}

/// A logical request payload, consumed once by the serializer.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Json(serde_json::Value),
    Text(String),
    /// `None` is an explicitly-null form, which encodes to an empty body.
    Form(Option<FormFields>),
    Raw(Vec<u8>),
    Multipart(Vec<MultipartField>),
}

impl Payload {
    /// Encode the payload. `Payload::None` has no body at all.
    pub fn serialize(&self) -> Result<Option<SerializedBody>, EncodingError> {
        let body = match self {
            Payload::None => return Ok(None),
            Payload::Json(value) => serialize_json(value)?,
            Payload::Text(text) => serialize_plain_text(text),
            Payload::Form(fields) => serialize_form_url_encoded(fields.as_ref()),
            Payload::Raw(bytes) => serialize_raw(bytes.clone()),
            Payload::Multipart(fields) => serialize_multipart(fields)?,
        };
        Ok(Some(body))
    }
}

/// Wire bytes plus the metadata that makes up the `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedBody {
    pub media_type: String,
    pub charset: Option<String>,
    pub boundary: Option<String>,
    pub bytes: Vec<u8>,
}

impl SerializedBody {
    fn new(media_type: &str, charset: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.to_string(),
            charset: charset.map(str::to_string),
            boundary: None,
            bytes,
        }
    }

    /// Full `Content-Type` header value, parameters included.
    pub fn content_type(&self) -> String {
        let mut value = self.media_type.clone();
        if let Some(charset) = &self.charset {
            value.push_str("; charset=");
            value.push_str(charset);
        }
        if let Some(boundary) = &self.boundary {
            value.push_str("; boundary=");
            value.push_str(boundary);
        }
        value
    }

    /// The body as text, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

pub fn serialize_json<T: Serialize + ?Sized>(value: &T) -> Result<SerializedBody, EncodingError> {
    let bytes = serde_json::to_vec(value).map_err(|e| {
        tracing::debug!(error = %e, "json payload refused to serialize");
        EncodingError::serialization_failed()
    })?;
    Ok(SerializedBody::new("application/json", Some(UTF8), bytes))
}

pub fn serialize_plain_text(text: &str) -> SerializedBody {
    SerializedBody::new("text/plain", Some(UTF8), text.as_bytes().to_vec())
}

pub fn serialize_form_url_encoded(fields: Option<&FormFields>) -> SerializedBody {
    let encoded = fields.map(encode_form).unwrap_or_default();
    SerializedBody::new("application/x-www-form-urlencoded", None, encoded.into_bytes())
}

pub fn serialize_raw(bytes: Vec<u8>) -> SerializedBody {
    SerializedBody::new("application/octet-stream", None, bytes)
}

/// Encode `fields` as `multipart/form-data` with a freshly generated boundary.
pub fn serialize_multipart(fields: &[MultipartField]) -> Result<SerializedBody, EncodingError> {
    let boundary = uuid::Uuid::new_v4().simple().to_string();
    serialize_multipart_with_boundary(fields, &boundary)
}

/// Encode `fields` with a caller-chosen boundary. An empty field list is
/// rejected: there would be nothing to send.
pub fn serialize_multipart_with_boundary(
    fields: &[MultipartField],
    boundary: &str,
) -> Result<SerializedBody, EncodingError> {
    if fields.is_empty() {
        return Err(EncodingError::new("multipart payload has no parts to send"));
    }
    if boundary.is_empty() {
        return Err(EncodingError::new("multipart boundary must not be empty"));
    }

    let mut buf = Vec::new();
    for field in fields {
        buf.extend_from_slice(b"--");
        buf.extend_from_slice(boundary.as_bytes());
        buf.extend_from_slice(b"\r\nContent-Disposition: form-data; name=\"");
        buf.extend_from_slice(quote_param(&field.name).as_bytes());
        buf.extend_from_slice(b"\"");
        if let Some(file_name) = field.file_name.as_deref().filter(|f| !f.is_empty()) {
            buf.extend_from_slice(b"; filename=\"");
            buf.extend_from_slice(quote_param(file_name).as_bytes());
            buf.extend_from_slice(b"\"");
        }
        if let Some(mime) = field.mime_type.as_deref().filter(|m| !m.is_empty()) {
            buf.extend_from_slice(b"\r\nContent-Type: ");
            buf.extend_from_slice(mime.as_bytes());
        }
        buf.extend_from_slice(b"\r\n\r\n");
        buf.extend_from_slice(&field.bytes);
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"--");
    buf.extend_from_slice(boundary.as_bytes());
    buf.extend_from_slice(b"--\r\n");

    Ok(SerializedBody {
        media_type: "multipart/form-data".to_string(),
        charset: None,
        boundary: Some(boundary.to_string()),
        bytes: buf,
    })
}

fn encode_form(fields: &FormFields) -> String {
    let mut pairs = Vec::new();
    for (key, value) in fields {
        let key_enc = encode_component(key);
        match value {
            FormValue::Null => pairs.push(format!("{key_enc}=")),
            FormValue::Scalar(v) => pairs.push(format!("{key_enc}={}", encode_component(v))),
            FormValue::List(items) => {
                for item in items {
                    pairs.push(format!("{key_enc}[]={}", encode_component(item)));
                }
            }
        }
    }
    pairs.join("&")
}

fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, URI_COMPONENT).to_string()
}

// Quoted-string escaping for Content-Disposition parameters.
fn quote_param(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "\\\r")
        .replace('\n', "\\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use std::collections::HashMap;

    fn scalar(s: &str) -> FormValue {
        FormValue::Scalar(s.to_string())
    }

    /// Stands in for a self-referential structure: serializing it fails.
    struct Cyclic;

    impl Serialize for Cyclic {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cycle detected"))
        }
    }

    #[test]
    fn json_sets_content_type_and_charset() {
        let body = serialize_json(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(body.content_type(), "application/json; charset=utf-8");
        assert_eq!(body.as_text(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn json_failure_is_encoding_error() {
        let err = serialize_json(&Cyclic).unwrap_err();
        assert_eq!(err, EncodingError::serialization_failed());
    }

    #[test]
    fn json_non_string_keys_fail_cleanly() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], "x");
        assert!(serialize_json(&map).is_err());
    }

    #[test]
    fn plain_text_is_verbatim() {
        let body = serialize_plain_text("héllo wörld\n");
        assert_eq!(body.as_text(), Some("héllo wörld\n"));
        assert_eq!(body.content_type(), "text/plain; charset=utf-8");
    }

    #[test]
    fn form_encodes_scalars_lists_and_nulls_in_order() {
        let fields = vec![
            ("name".to_string(), scalar("John Doe")),
            ("tags".to_string(), FormValue::List(vec!["a&b".into(), "c".into()])),
            ("empty".to_string(), FormValue::Null),
        ];
        let body = serialize_form_url_encoded(Some(&fields));
        assert_eq!(
            body.as_text(),
            Some("name=John%20Doe&tags[]=a%26b&tags[]=c&empty=")
        );
        assert_eq!(body.content_type(), "application/x-www-form-urlencoded");
        assert!(body.charset.is_none());
    }

    #[test]
    fn form_null_payload_is_empty_body() {
        let body = serialize_form_url_encoded(None);
        assert!(body.bytes.is_empty());
    }

    #[test]
    fn form_keeps_uri_component_unreserved_marks() {
        let fields = vec![("k(1)".to_string(), scalar("it's*!~"))];
        let body = serialize_form_url_encoded(Some(&fields));
        assert_eq!(body.as_text(), Some("k(1)=it's*!~"));
    }

    #[test]
    fn form_encodes_keys_and_unicode() {
        let fields = vec![("a b".to_string(), scalar("é/?"))];
        let body = serialize_form_url_encoded(Some(&fields));
        assert_eq!(body.as_text(), Some("a%20b=%C3%A9%2F%3F"));
    }

    #[test]
    fn form_empty_list_contributes_nothing() {
        let fields = vec![
            ("a".to_string(), FormValue::List(Vec::new())),
            ("b".to_string(), scalar("1")),
        ];
        let body = serialize_form_url_encoded(Some(&fields));
        assert_eq!(body.as_text(), Some("b=1"));
    }

    #[test]
    fn raw_passes_bytes_through() {
        let body = serialize_raw(vec![0, 159, 146, 150]);
        assert_eq!(body.bytes, vec![0, 159, 146, 150]);
        assert_eq!(body.content_type(), "application/octet-stream");
    }

    #[test]
    fn multipart_preserves_field_order() {
        let fields = vec![
            MultipartField::from_base64("first", None, None, "aGVsbG8=").unwrap(),
            MultipartField::from_base64(
                "second",
                Some("a.txt".into()),
                Some("text/plain".into()),
                "d29ybGQ=",
            )
            .unwrap(),
        ];
        let body = serialize_multipart_with_boundary(&fields, "XyZ").unwrap();
        let expected = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"first\"\r\n\r\n\
            hello\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"second\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            world\r\n\
            --XyZ--\r\n";
        assert_eq!(body.as_text(), Some(expected));
        assert_eq!(body.content_type(), "multipart/form-data; boundary=XyZ");
    }

    #[test]
    fn multipart_escapes_quotes_in_names() {
        let fields = vec![MultipartField {
            name: "a\"b".into(),
            file_name: None,
            mime_type: None,
            bytes: b"x".to_vec(),
        }];
        let body = serialize_multipart_with_boundary(&fields, "B").unwrap();
        assert!(body.as_text().unwrap().contains("name=\"a\\\"b\""));
    }

    #[test]
    fn multipart_empty_list_is_encoding_error() {
        let err = serialize_multipart(&[]).unwrap_err();
        assert!(err.reason.contains("no parts"));
    }

    #[test]
    fn multipart_generated_boundary_appears_in_body() {
        let fields = vec![MultipartField {
            name: "f".into(),
            file_name: None,
            mime_type: None,
            bytes: b"v".to_vec(),
        }];
        let body = serialize_multipart(&fields).unwrap();
        let boundary = body.boundary.clone().unwrap();
        assert_eq!(boundary.len(), 32);
        assert!(body.as_text().unwrap().ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn multipart_rejects_bad_base64() {
        let err = MultipartField::from_base64("f", None, None, "not base64!").unwrap_err();
        assert!(err.reason.contains("invalid base64"));
    }

    #[test]
    fn unknown_serializer_kind_is_rejected() {
        assert_eq!("urlencoded".parse::<SerializerKind>(), Ok(SerializerKind::UrlEncoded));
        assert!("xml".parse::<SerializerKind>().is_err());
    }

    #[test]
    fn payload_none_has_no_body() {
        assert_eq!(Payload::None.serialize().unwrap(), None);
        let body = Payload::Text("t".into()).serialize().unwrap().unwrap();
        assert_eq!(body.media_type, "text/plain");
    }
}
