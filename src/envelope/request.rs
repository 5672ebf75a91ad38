//! Request value handed to handlers.
//!
//! # Design Decisions
//! - `RequestOf<T>` is generic over the body so adapters can hand inner
//!   functions an already-decoded value
//! - Headers are canonicalized before any handler sees them
//! - The caller context is opaque JSON; its schema belongs to the caller

use std::fmt;
use std::io;

use bytes::Bytes;
use serde::Serialize;
use tokio::io::AsyncReadExt;

use crate::body::Contents;
use crate::envelope::complex::ComplexPayload;
use crate::envelope::headers::{Headers, Values};

/// A request whose body has been decoded into `T`.
#[derive(Debug, Clone, Default)]
pub struct RequestOf<T> {
    pub fn_id: String,
    pub fn_version: i64,

    pub body: T,

    /// Caller-supplied context, `Null` when absent.
    pub context: serde_json::Value,
    pub headers: Headers,
    pub query: Values,
    /// Logical path, always starting with `/` once routed.
    pub path: String,
    pub method: String,
    pub access_token: String,
    pub trace_id: String,
}

/// The request as decoded from the wire.
pub type Request = RequestOf<RequestBody>;

impl<T> RequestOf<T> {
    /// Swap the body, keeping every other attribute.
    pub fn with_body<U>(self, body: U) -> RequestOf<U> {
        self.split_body(body).0
    }

    /// Swap the body and return the previous one.
    pub fn split_body<U>(self, body: U) -> (RequestOf<U>, T) {
        let req = RequestOf {
            fn_id: self.fn_id,
            fn_version: self.fn_version,
            body,
            context: self.context,
            headers: self.headers,
            query: self.query,
            path: self.path,
            method: self.method,
            access_token: self.access_token,
            trace_id: self.trace_id,
        };
        (req, self.body)
    }
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set a JSON body.
    pub fn with_json<B: Serialize>(mut self, body: &B) -> serde_json::Result<Self> {
        self.body = RequestBody::Bytes(serde_json::to_vec(body)?.into());
        Ok(self)
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.add(key, value);
        self
    }
}

/// The three mutually exclusive body representations.
pub enum RequestBody {
    /// Raw JSON payload from an envelope.
    Bytes(Bytes),
    /// A single streamed file part.
    Stream(Box<dyn Contents>),
    /// A body with several named file streams.
    Complex(ComplexPayload),
}

impl Default for RequestBody {
    fn default() -> Self {
        RequestBody::Bytes(Bytes::new())
    }
}

impl RequestBody {
    /// Read the whole body into memory.
    ///
    /// A complex payload is a structure, not a stream, and cannot be read.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            RequestBody::Bytes(b) => Ok(b),
            RequestBody::Stream(mut s) => {
                let mut buf = Vec::new();
                let read = s.read_to_end(&mut buf).await;
                let closed = s.close().await;
                read?;
                closed?;
                Ok(buf.into())
            }
            RequestBody::Complex(mut c) => {
                if let Err(e) = c.close().await {
                    tracing::error!(err = %e, "Failed to close complex payload files");
                }
                Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "complex payload cannot be read as a stream; treat it as a structure",
                ))
            }
        }
    }

    /// Release any streams held by the body.
    pub async fn close(&mut self) -> io::Result<()> {
        match self {
            RequestBody::Bytes(_) => Ok(()),
            RequestBody::Stream(s) => s.close().await,
            RequestBody::Complex(c) => c.close().await,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
            RequestBody::Complex(c) => f.debug_tuple("Complex").field(c).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::contents::from_bytes;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn stream_body_reads_fully() {
        let body = RequestBody::Stream(from_bytes("streamed"));
        assert_eq!(body.into_bytes().await.unwrap(), Bytes::from("streamed"));
    }

    #[tokio::test]
    async fn complex_body_cannot_be_read() {
        let body = RequestBody::Complex(ComplexPayload::new("x"));
        let err = body.into_bytes().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    struct FailingClose(Arc<AtomicBool>);

    impl tokio::io::AsyncRead for FailingClose {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[async_trait::async_trait]
    impl Contents for FailingClose {
        async fn close(&mut self) -> io::Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Err(io::Error::other("disk gone"))
        }
    }

    #[tokio::test]
    async fn complex_body_close_failure_keeps_unsupported_error() {
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));
        let payload = ComplexPayload::new("x")
            .with_file("a.txt", Box::new(FailingClose(first.clone())))
            .with_file("b.txt", Box::new(FailingClose(second.clone())));

        let err = RequestBody::Complex(payload).into_bytes().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }

    #[test]
    fn with_body_keeps_metadata() {
        let req = Request::new("GET", "/x").with_header("x-a", "1");
        let (typed, old) = req.split_body(5u32);
        assert_eq!(typed.body, 5);
        assert_eq!(typed.path, "/x");
        assert_eq!(typed.headers.get("X-A"), Some("1"));
        assert!(matches!(old, RequestBody::Bytes(b) if b.is_empty()));
    }
}
