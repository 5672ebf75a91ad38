//! In-process harness running a handler through the HTTP transport.
//!
//! Requests go through the same router, middleware, codec, healthz fallback
//! and file materialization as a served function, without binding a socket.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body as AxumBody;
use axum::http::{header, Method, Request as HttpRequest, StatusCode};
use axum::Router;
use bytes::Bytes;
use tower::ServiceExt;

use crate::config::RuntimeSettings;
use crate::envelope::{Envelope, ResponseEnvelope};
use crate::handler::Handler;
use crate::http::{Healthz, HttpServer, X_REQUEST_ID};
use crate::lifecycle::Shutdown;

/// Harness failures. A handler's own errors arrive inside the envelope.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("failed to marshal request envelope: {0}")]
    Marshal(#[source] serde_json::Error),

    #[error("failed to build request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("failed to read response body: {0}")]
    Body(#[from] axum::Error),

    #[error("failed to unmarshal response envelope: {0}")]
    Unmarshal(#[source] serde_json::Error),
}

/// What came back over the wire.
#[derive(Debug, Clone)]
pub struct TestResponse {
    pub status: StatusCode,
    pub request_id: Option<String>,
    pub envelope: ResponseEnvelope,
}

/// Drives a handler through the HTTP transport in-process.
pub struct TestRunner {
    router: Router,
    shutdown: Shutdown,
}

impl TestRunner {
    /// Harness with default settings.
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self::with_settings(handler, &RuntimeSettings::default())
    }

    pub fn with_settings(handler: impl Handler + 'static, settings: &RuntimeSettings) -> Self {
        let shutdown = Shutdown::new();
        let handler: Arc<dyn Handler> = Arc::new(Healthz::new(handler, settings.function.build_version));
        let router = HttpServer::new(handler, settings, shutdown.clone()).router();
        Self { router, shutdown }
    }

    /// Cancelled when the harness is dropped; handlers observe it through
    /// their context.
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// POST an inbound envelope as JSON.
    pub async fn call(&self, envelope: &Envelope) -> Result<TestResponse, HarnessError> {
        let payload = serde_json::to_vec(envelope).map_err(HarnessError::Marshal)?;
        self.send_raw("application/json", payload).await
    }

    /// POST an arbitrary payload, e.g. a multipart form.
    pub async fn send_raw(
        &self,
        content_type: &str,
        payload: impl Into<Bytes>,
    ) -> Result<TestResponse, HarnessError> {
        let request = HttpRequest::builder()
            .method(Method::POST)
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(AxumBody::from(payload.into()))?;
        self.send(request).await
    }

    pub async fn send(&self, request: HttpRequest<AxumBody>) -> Result<TestResponse, HarnessError> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|e: Infallible| match e {});

        let status = response.status();
        let request_id = response
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let envelope = serde_json::from_slice(&bytes).map_err(HarnessError::Unmarshal)?;

        Ok(TestResponse {
            status,
            request_id,
            envelope,
        })
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Contents, File};
    use crate::envelope::{ApiError, Response};
    use crate::handler::handler_fn;
    use crate::routing::Mux;
    use serde_json::json;

    fn echo() -> Mux {
        Mux::new().post(
            "/echo",
            handler_fn(|ctx, req| async move {
                let body = req.body.into_bytes().await.unwrap_or_default();
                let value: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
                Response::json(json!({ "body": value, "trace_id": ctx.trace_id() }))
            }),
        )
    }

    #[tokio::test]
    async fn envelope_round_trips_through_transport() {
        let runner = TestRunner::new(echo());
        let mut env = Envelope::new("POST", "/echo");
        env.body = Some(json!({"n": 1}));
        env.trace_id = "t-1".into();

        let resp = runner.call(&env).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.request_id.is_some());
        assert_eq!(
            resp.envelope.body,
            Some(json!({"body": {"n": 1}, "trace_id": "t-1"}))
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_reported_in_envelope() {
        let runner = TestRunner::new(echo());
        let resp = runner.send_raw("application/json", "{nope").await.unwrap();
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.envelope.errors,
            vec![ApiError::internal("unable to process incoming request")]
        );
    }

    #[tokio::test]
    async fn handler_panic_becomes_internal_error() {
        let runner = TestRunner::new(handler_fn(|_ctx, _req| async {
            if true {
                panic!("boom");
            }
            Response::new()
        }));
        let resp = runner.call(&Envelope::new("GET", "/")).await.unwrap();
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.envelope.errors,
            vec![ApiError::internal("encountered unexpected error")]
        );
    }

    struct ExplodingJson;

    impl serde::Serialize for ExplodingJson {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            panic!("serializer exploded");
        }
    }

    struct ExplodingReader;

    impl tokio::io::AsyncRead for ExplodingReader {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            panic!("reader exploded");
        }
    }

    #[async_trait::async_trait]
    impl Contents for ExplodingReader {}

    #[tokio::test]
    async fn panic_while_encoding_json_body_becomes_internal_error() {
        let runner = TestRunner::new(handler_fn(|_ctx, _req| async {
            Response::json(ExplodingJson)
        }));
        let resp = runner.call(&Envelope::new("GET", "/")).await.unwrap();
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.envelope.errors,
            vec![ApiError::internal("encountered unexpected error")]
        );
        assert!(resp.envelope.body.is_none());
    }

    #[tokio::test]
    async fn panic_while_reading_file_contents_becomes_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RuntimeSettings {
            output_dir: dir.path().to_path_buf(),
            ..RuntimeSettings::default()
        };
        let runner = TestRunner::with_settings(
            handler_fn(|_ctx, _req| async {
                Response::file(File::new(ExplodingReader).with_filename("out.txt"))
            }),
            &settings,
        );
        let resp = runner.call(&Envelope::new("GET", "/")).await.unwrap();
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.envelope.errors,
            vec![ApiError::internal("encountered unexpected error")]
        );
    }

    #[tokio::test]
    async fn drop_cancels_handler_contexts() {
        let runner = TestRunner::new(Mux::new());
        let token = runner.shutdown().token();
        drop(runner);
        assert!(token.is_cancelled());
    }
}
