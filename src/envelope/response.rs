//! Response value handed back by handlers.
//!
//! # Design Decisions
//! - Bodies serialize lazily: a JSON body is only turned into a value by the
//!   encoder, so a serialization failure can still yield a valid envelope
//! - Status resolution: explicit code, else the highest error code, else 200

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::body::File;
use crate::envelope::headers::Headers;

pub const STATUS_OK: u16 = 200;

/// An error shared back with the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// A value that can produce its JSON form on demand.
pub trait JsonBody: Send {
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T: Serialize + Send> JsonBody for T {
    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Response body: inline JSON or a file to materialize.
pub enum Body {
    Json(Box<dyn JsonBody>),
    File(File),
}

impl Body {
    pub fn json<T: Serialize + Send + 'static>(value: T) -> Self {
        Body::Json(Box::new(value))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Body::File(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Json(_) => f.write_str("Json(..)"),
            Body::File(file) => f.debug_tuple("File").field(file).finish(),
        }
    }
}

impl From<File> for Body {
    fn from(file: File) -> Self {
        Body::File(file)
    }
}

/// The typed response produced by a handler.
#[derive(Debug, Default)]
pub struct Response {
    pub body: Option<Body>,
    /// Explicit status; zero means derive it from `errors`.
    pub code: u16,
    pub errors: Vec<ApiError>,
    pub headers: Headers,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json<T: Serialize + Send + 'static>(value: T) -> Self {
        Self {
            body: Some(Body::json(value)),
            ..Self::default()
        }
    }

    pub fn file(file: File) -> Self {
        Self {
            body: Some(Body::File(file)),
            ..Self::default()
        }
    }

    /// An errors-only response whose code is pinned to the resolved status.
    pub fn from_errors(errors: impl IntoIterator<Item = ApiError>) -> Self {
        let mut resp = Self {
            errors: errors.into_iter().collect(),
            ..Self::default()
        };
        resp.code = resp.status_code();
        resp
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.add(key, value);
        self
    }

    pub fn with_error(mut self, err: ApiError) -> Self {
        self.errors.push(err);
        self
    }

    /// The status this response resolves to on the wire.
    pub fn status_code(&self) -> u16 {
        resolve_status(self.code, &self.errors)
    }
}

pub(crate) fn resolve_status(code: u16, errors: &[ApiError]) -> u16 {
    if code != 0 {
        return code;
    }
    errors
        .iter()
        .map(|e| e.code)
        .max()
        .filter(|c| *c != 0)
        .unwrap_or(STATUS_OK)
}
