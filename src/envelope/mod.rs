//! Envelope codec subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound HTTP request
//!     → codec.rs (JSON envelope, 5 MiB ceiling)
//!       or multipart.rs (meta + body / file parts)
//!     → request.rs (Request with canonical headers)
//!     → [handler graph]
//!     → response.rs (Response: body, code, errors, headers)
//!     → codec.rs (outbound envelope, resolved status)
//! ```

pub mod codec;
pub mod complex;
pub mod headers;
pub mod multipart;
pub mod request;
pub mod response;

pub use codec::{decode, decode_json, encode, to_envelope, DecodeError, Encoded, Envelope, Params, ResponseEnvelope};
pub use complex::ComplexPayload;
pub use headers::{canonical_key, Headers, Values};
pub use request::{Request, RequestBody, RequestOf};
pub use response::{ApiError, Body, JsonBody, Response};
