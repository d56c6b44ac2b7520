//! Verify the URL-encoded serializer against JSON test vectors stored in
//! `test-vectors/`.
//!
//! Each case is the `data` argument of a request and the exact body the
//! serializer must produce. A second pass decodes every produced pair and
//! checks it against the input, so the escaping stays reversible.

use native_http_core::args::decode_payload;
use native_http_core::{FormValue, Payload, SerializerKind};
use percent_encoding::percent_decode_str;
use serde_json::Value;

fn vectors() -> Vec<Value> {
    let raw = include_str!("../../test-vectors/urlencoded.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

fn encode(input: &Value) -> (Payload, String) {
    let payload = decode_payload(SerializerKind::UrlEncoded, input).unwrap();
    let body = payload.serialize().unwrap().unwrap();
    assert_eq!(body.content_type(), "application/x-www-form-urlencoded");
    let text = body.as_text().unwrap().to_string();
    (payload, text)
}

fn decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8().unwrap().into_owned()
}

#[test]
fn urlencoded_test_vectors() {
    for case in vectors() {
        let name = case["name"].as_str().unwrap();
        let (_, body) = encode(&case["input"]);
        assert_eq!(body, case["expected"].as_str().unwrap(), "{name}: body");
    }
}

#[test]
fn urlencoded_pairs_decode_back_to_input() {
    for case in vectors() {
        let name = case["name"].as_str().unwrap();
        let (payload, body) = encode(&case["input"]);
        let Payload::Form(Some(fields)) = payload else {
            assert!(body.is_empty(), "{name}: null data must encode to nothing");
            continue;
        };

        let mut expected = Vec::new();
        for (key, value) in &fields {
            match value {
                FormValue::Null => expected.push((key.clone(), String::new())),
                FormValue::Scalar(v) => expected.push((key.clone(), v.clone())),
                FormValue::List(items) => {
                    expected.extend(items.iter().map(|item| (format!("{key}[]"), item.clone())))
                }
            }
        }

        let decoded: Vec<(String, String)> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('&')
                .map(|pair| {
                    let (k, v) = pair.split_once('=').unwrap();
                    (decode(k), decode(v))
                })
                .collect()
        };
        assert_eq!(decoded, expected, "{name}: decoded pairs");
    }
}
