//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with one fallback route
//! - Wire up middleware (tracing, request ID, multipart body limit)
//! - Decode each request, then run handler, materialization and encoding
//!   under one panic boundary
//! - Drain in-flight requests on shutdown, bounded by the grace period

use std::future::IntoFuture;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{DefaultBodyLimit, State};
use axum::response::IntoResponse;
use axum::Router;
use futures_util::FutureExt;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::body::{destination, normalize_file, write_file, MaterializeError, MaterializedFile};
use crate::config::RuntimeSettings;
use crate::envelope::{self, ApiError, Body, Response};
use crate::handler::{Context, Handler};
use crate::lifecycle::Shutdown;
use crate::observability::logging::panic_message;
use crate::observability::metrics;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<dyn Handler>,
    pub output_dir: Arc<PathBuf>,
    pub max_json_bytes: usize,
    pub shutdown: Shutdown,
}

/// HTTP transport for a function handler.
pub struct HttpServer {
    router: Router,
    grace: Duration,
    shutdown: Shutdown,
}

impl HttpServer {
    pub fn new(handler: Arc<dyn Handler>, settings: &RuntimeSettings, shutdown: Shutdown) -> Self {
        let state = AppState {
            handler,
            output_dir: Arc::new(settings.output_dir.clone()),
            max_json_bytes: settings.max_json_bytes,
            shutdown: shutdown.clone(),
        };

        Self {
            router: Self::build_router(state, settings.max_multipart_bytes),
            grace: settings.shutdown_grace(),
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState, max_multipart_bytes: usize) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(DefaultBodyLimit::max(max_multipart_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for in-process callers.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until shutdown, then drain for at most the grace period.
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let drain = self.shutdown.clone();
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { drain.cancelled().await })
            .into_future();

        let grace = self.grace;
        let deadline = async {
            self.shutdown.cancelled().await;
            tracing::info!(grace_secs = grace.as_secs(), "Shutting down HTTP server");
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            res = serve => res?,
            _ = deadline => {
                tracing::warn!("Graceful drain timed out; closing remaining connections");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every inbound request lands here.
async fn dispatch(State(state): State<AppState>, request: axum::extract::Request) -> impl IntoResponse {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let req = match envelope::decode(request, state.max_json_bytes).await {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(request_id = %request_id, err = %e, "Failed to decode request");
            metrics::record_request("unknown", 500, start);
            return envelope::encode(Response::from_errors([ApiError::internal(
                "unable to process incoming request",
            )]));
        }
    };

    let method = req.method.clone();
    let span = tracing::info_span!(
        "fn_request",
        trace_id = %req.trace_id,
        request_id = %request_id,
        method = %method,
        path = %req.path,
    );

    async move {
        let ctx = Context::new(req.trace_id.clone(), state.shutdown.child_token())
            .with_request_id(request_id);

        // User code runs in all three stages: the handler, its file
        // contents and its JSON serializer.
        let pipeline = async {
            let resp = state.handler.handle(ctx, req).await;
            let resp = materialize(resp, &state.output_dir).await;
            envelope::encode(resp)
        };

        let encoded = match AssertUnwindSafe(pipeline).catch_unwind().await {
            Ok(encoded) => encoded,
            Err(payload) => {
                metrics::record_panic();
                tracing::error!(panic = %panic_message(payload.as_ref()), "Handler panicked");
                envelope::encode(Response::from_errors([ApiError::internal(
                    "encountered unexpected error",
                )]))
            }
        };

        metrics::record_request(&method, encoded.status.as_u16(), start);
        tracing::debug!(status = encoded.status.as_u16(), "Request completed");
        encoded
    }
    .instrument(span)
    .await
}

/// Replace a file-typed body with the metadata of the written file.
///
/// A write failure appends an internal error and leaves the file metadata
/// as the body.
pub async fn materialize(mut resp: Response, output_dir: &Path) -> Response {
    let file = match resp.body.take() {
        Some(Body::File(file)) => file,
        other => {
            resp.body = other;
            return resp;
        }
    };

    let mut file = normalize_file(file);
    let result = match file.contents.take() {
        Some(mut contents) => match destination(output_dir, &file.filename) {
            Ok(path) => write_file(contents, path).await,
            Err(e) => {
                if let Err(close_err) = contents.close().await {
                    tracing::error!(err = %close_err, "Failed to close file contents");
                }
                Err(e)
            }
        },
        None => Err(MaterializeError::MissingContents),
    };

    match result {
        Ok(written) => {
            metrics::record_file_written(written.size);
            resp.body = Some(Body::json(MaterializedFile {
                content_type: file.content_type,
                encoding: file.encoding,
                filename: file.filename,
                sha256: written.sha256,
                size: written.size,
            }));
        }
        Err(e) => {
            metrics::record_file_failed();
            tracing::error!(filename = %file.filename, err = %e, "Failed to materialize file");
            resp.errors.push(ApiError::internal(e.to_string()));
            resp.body = Some(Body::File(file));
        }
    }
    resp
}
