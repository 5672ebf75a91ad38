//! Healthz fallback for functions that do not serve `/healthz` themselves.
//!
//! # Design Decisions
//! - The wrapped handler always runs first; the fallback only answers a
//!   `GET /healthz` the handler rejected with "route not found"
//! - Error handlers never produce "route not found", so a function with a
//!   broken config reports that error on `/healthz` as well
//! - Function id and version echo the probing envelope; only the build
//!   version is a property of the running process

use async_trait::async_trait;
use serde::Serialize;

use crate::envelope::{Request, Response};
use crate::handler::{Context, Handler};
use crate::routing::ROUTE_NOT_FOUND;

pub const HEALTHZ_PATH: &str = "/healthz";

#[derive(Debug, Serialize)]
struct Status {
    status: &'static str,
    fn_id: String,
    fn_version: String,
    fn_build_version: String,
}

/// Wraps a handler with the healthz fallback.
pub struct Healthz<H> {
    inner: H,
    build_version: i64,
}

impl<H> Healthz<H> {
    pub fn new(inner: H, build_version: i64) -> Self {
        Self {
            inner,
            build_version,
        }
    }

    fn status(&self, fn_id: String, fn_version: i64) -> Response {
        Response::json(Status {
            status: "ok",
            fn_id,
            fn_version: fn_version.to_string(),
            fn_build_version: self.build_version.to_string(),
        })
    }
}

fn is_route_not_found(resp: &Response) -> bool {
    matches!(resp.errors.as_slice(), [err] if err.code == 404 && err.message == ROUTE_NOT_FOUND)
}

#[async_trait]
impl<H: Handler> Handler for Healthz<H> {
    async fn handle(&self, ctx: Context, req: Request) -> Response {
        let probe = (req.method.eq_ignore_ascii_case("GET") && req.path == HEALTHZ_PATH)
            .then(|| (req.fn_id.clone(), req.fn_version));
        let resp = self.inner.handle(ctx, req).await;

        match probe {
            Some((fn_id, fn_version)) if is_route_not_found(&resp) => self.status(fn_id, fn_version),
            _ => resp,
        }
    }
}
