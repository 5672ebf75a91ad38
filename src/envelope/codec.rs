//! Wire envelope encoding and decoding.
//!
//! # Responsibilities
//! - Read the inbound envelope under a size ceiling
//! - Map envelope fields onto [`Request`], canonicalizing headers
//! - Encode a [`Response`] into the outbound envelope, always producing a
//!   parseable payload

use std::collections::BTreeMap;

use axum::body::Body as AxumBody;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::envelope::headers::{Headers, Values};
use crate::envelope::multipart;
use crate::envelope::request::{Request, RequestBody};
use crate::envelope::response::{resolve_status, ApiError, Body, Response};

/// Ceiling for JSON envelopes.
pub const MAX_JSON_BYTES: usize = 5 << 20;

const FALLBACK_PAYLOAD: &[u8] =
    br#"{"code":500,"errors":[{"code":500,"message":"failed to marshal response"}]}"#;

/// Decoding failures. Never echoed to callers.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),

    #[error("failed to unmarshal request body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("no meta field provided in multipart form submission")]
    MissingMeta,

    #[error("failed to unmarshal meta from multipart field: {0}")]
    InvalidMeta(#[source] serde_json::Error),

    #[error("failed to read multipart form: {0}")]
    Multipart(String),

    #[error("no body field provided in multipart form submission")]
    MissingBody,

    #[error("multiple files named {0:?} in multipart form submission")]
    DuplicateFile(String),
}

/// Header and query parameters of the inbound envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query: Values,
}

/// Inbound wire envelope. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_token: String,
    pub method: String,
    pub params: Params,
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub trace_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fn_id: String,
    #[serde(deserialize_with = "int_or_string", skip_serializing_if = "is_zero")]
    pub fn_version: i64,
}

impl Envelope {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Build a request around an already-decoded body.
    pub(crate) fn into_request(self, body: RequestBody) -> Request {
        Request {
            fn_id: self.fn_id,
            fn_version: self.fn_version,
            body,
            context: self.context.unwrap_or(Value::Null),
            headers: Headers::canonicalize(self.params.header),
            query: self.params.query,
            path: self.url,
            method: self.method,
            access_token: self.access_token,
            trace_id: self.trace_id,
        }
    }
}

/// Outbound wire envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "is_zero_code")]
    pub code: u16,
    #[serde(default)]
    pub errors: Vec<ApiError>,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn is_zero_code(v: &u16) -> bool {
    *v == 0
}

fn int_or_string<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
        Null,
    }

    match Raw::deserialize(de)? {
        Raw::Int(v) => Ok(v),
        Raw::Str(s) if s.is_empty() => Ok(0),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        Raw::Null => Ok(0),
    }
}

/// Decode an inbound HTTP request into a [`Request`].
pub async fn decode(req: axum::extract::Request, max_json_bytes: usize) -> Result<Request, DecodeError> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        return multipart::decode_multipart(req).await;
    }

    let payload = read_limited(req.into_body(), max_json_bytes).await?;
    decode_json(&payload)
}

/// Decode a JSON envelope.
pub fn decode_json(payload: &[u8]) -> Result<Request, DecodeError> {
    let mut envelope: Envelope = serde_json::from_slice(payload)?;
    let body = match envelope.body.take() {
        Some(v) => Bytes::from(serde_json::to_vec(&v)?),
        None => Bytes::new(),
    };
    Ok(envelope.into_request(RequestBody::Bytes(body)))
}

async fn read_limited(body: AxumBody, limit: usize) -> Result<Bytes, DecodeError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(DecodeError::Read)?;
        if buf.len() + chunk.len() > limit {
            return Err(DecodeError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Convert a response into its wire envelope.
///
/// A body that fails to serialize is dropped and reported as an error entry.
pub fn to_envelope(resp: Response) -> ResponseEnvelope {
    let Response {
        body,
        code,
        mut errors,
        headers,
    } = resp;

    let body = match body {
        None => None,
        Some(Body::Json(v)) => match v.to_json() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(err = %e, "Failed to marshal response body");
                errors.push(ApiError::internal(format!("failed to marshal response body: {e}")));
                None
            }
        },
        Some(Body::File(f)) => Some(f.metadata()),
    };

    ResponseEnvelope {
        body,
        code: resolve_status(code, &errors),
        errors,
        headers,
    }
}

/// Encoded outbound envelope ready to be written.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub status: StatusCode,
    pub payload: Bytes,
}

/// Encode a response into its HTTP status and JSON payload.
pub fn encode(resp: Response) -> Encoded {
    let envelope = to_envelope(resp);
    let status = StatusCode::from_u16(envelope.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let payload = match serde_json::to_vec(&envelope) {
        Ok(b) => Bytes::from(b),
        Err(e) => {
            tracing::error!(err = %e, "Failed to marshal response envelope");
            Bytes::from_static(FALLBACK_PAYLOAD)
        }
    };

    Encoded { status, payload }
}

impl IntoResponse for Encoded {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            self.payload,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::File;
    use serde::ser::Error as _;

    #[test]
    fn decode_canonicalizes_headers() {
        let payload = br#"{
            "method": "GET",
            "url": "/x",
            "params": {"header": {"x-FOO": ["a", "b"]}, "query": {"q": ["1", "2"]}},
            "trace_id": "t-1",
            "unknown": true
        }"#;
        let req = decode_json(payload).unwrap();
        assert_eq!(req.headers.get("x-Foo"), Some("a"));
        assert_eq!(req.headers.get_all("X-FOO"), ["a".to_string(), "b".to_string()]);
        assert_eq!(req.query["q"], vec!["1", "2"]);
        assert_eq!(req.trace_id, "t-1");
        assert_eq!(req.context, Value::Null);
    }

    #[tokio::test]
    async fn decode_keeps_body_and_identity() {
        let payload = br#"{"body":{"a":1},"context":{"k":"v"},"fn_id":"abc","fn_version":"3","access_token":"tok","method":"POST","url":"/y"}"#;
        let req = decode_json(payload).unwrap();
        assert_eq!(req.fn_id, "abc");
        assert_eq!(req.fn_version, 3);
        assert_eq!(req.access_token, "tok");
        assert_eq!(req.context["k"], "v");
        let body = req.body.into_bytes().await.unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), serde_json::json!({"a": 1}));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        assert!(matches!(decode_json(b"{not json"), Err(DecodeError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn decode_enforces_ceiling() {
        let body = vec![b' '; 64];
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .body(AxumBody::from(body))
            .unwrap();
        let err = decode(req, 16).await.unwrap_err();
        assert!(matches!(err, DecodeError::TooLarge { limit: 16 }));
    }

    #[test]
    fn encode_round_trips_errors_and_code() {
        let resp = Response {
            errors: vec![
                ApiError::new(500, "a"),
                ApiError::new(501, "b"),
                ApiError::new(400, "c"),
            ],
            ..Response::default()
        };
        let encoded = encode(resp);
        assert_eq!(encoded.status, StatusCode::NOT_IMPLEMENTED);

        let back: ResponseEnvelope = serde_json::from_slice(&encoded.payload).unwrap();
        assert_eq!(back.code, 501);
        let codes: Vec<u16> = back.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![500, 501, 400]);
    }

    #[test]
    fn encode_omits_empty_fields_but_keeps_errors() {
        let encoded = encode(Response::new());
        let v: Value = serde_json::from_slice(&encoded.payload).unwrap();
        assert_eq!(v, serde_json::json!({"code": 200, "errors": []}));
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("nope"))
        }
    }

    #[test]
    fn body_serialization_failure_degrades_to_error() {
        let encoded = encode(Response::json(Unserializable));
        assert_eq!(encoded.status, StatusCode::INTERNAL_SERVER_ERROR);

        let back: ResponseEnvelope = serde_json::from_slice(&encoded.payload).unwrap();
        assert!(back.body.is_none());
        assert_eq!(back.errors.len(), 1);
        assert!(back.errors[0].message.starts_with("failed to marshal response body"));
    }

    #[test]
    fn unmaterialized_file_encodes_metadata() {
        let file = File::from_bytes("x")
            .with_content_type("text/plain")
            .with_filename("a.txt");
        let env = to_envelope(Response::file(file));
        let body = env.body.unwrap();
        assert_eq!(body["content_type"], "text/plain");
        assert_eq!(body["filename"], "a.txt");
    }

    #[test]
    fn headers_survive_encoding() {
        let env = to_envelope(Response::json("ok").with_header("x-custom", "1"));
        assert_eq!(env.headers.get("X-Custom"), Some("1"));
    }
}
