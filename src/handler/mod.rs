//! Handler contract and composing adapters.
//!
//! # Data Flow
//! ```text
//! Request
//!     → workflow.rs (optional: decode caller context into WorkflowCtx)
//!     → typed.rs (optional: decode body into T, then validate)
//!     → user function
//!     → Response
//! ```
//!
//! # Design Decisions
//! - One capability, `handle(ctx, req) -> Response`; adapters are values
//!   implementing it, so they stack arbitrarily
//! - Adapters short-circuit with bad-request errors and never call the
//!   inner function on decode or validation failure

pub mod typed;
pub mod workflow;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::envelope::{ApiError, Request, Response};

pub use typed::{typed, validated, Typed, Validate, Validated};
pub use workflow::{workflow, workflow_typed, Field, Workflow, WorkflowCtx, WorkflowTyped};

/// Request-scoped context handed to every handler.
#[derive(Debug, Clone, Default)]
pub struct Context {
    trace_id: String,
    request_id: String,
    cancellation: CancellationToken,
}

impl Context {
    pub fn new(trace_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            trace_id: trace_id.into(),
            request_id: String::new(),
            cancellation,
        }
    }

    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Token cancelled when the runtime begins shutting down.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// The single capability every function exposes.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: Context, req: Request) -> Response;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn handle(&self, ctx: Context, req: Request) -> Response {
        (**self).handle(ctx, req).await
    }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Box<H> {
    async fn handle(&self, ctx: Context, req: Request) -> Response {
        (**self).handle(ctx, req).await
    }
}

/// Adapts an async function into a [`Handler`].
#[derive(Clone)]
pub struct HandlerFn<F>(F);

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Context, Request) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    async fn handle(&self, ctx: Context, req: Request) -> Response {
        (self.0)(ctx, req).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Context, Request) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    HandlerFn(f)
}

/// Answers every request with the same errors.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
    errors: Vec<ApiError>,
}

#[async_trait]
impl Handler for ErrorHandler {
    async fn handle(&self, _ctx: Context, _req: Request) -> Response {
        Response::from_errors(self.errors.clone())
    }
}

pub fn error_handler(errors: impl IntoIterator<Item = ApiError>) -> ErrorHandler {
    ErrorHandler {
        errors: errors.into_iter().collect(),
    }
}
