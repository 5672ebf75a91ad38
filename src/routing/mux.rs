//! Exact-match method/path multiplexer.
//!
//! # Responsibilities
//! - Register handlers under (method, path) pairs at startup
//! - Distinguish an unknown path from a known path with the wrong method
//! - Hand the request to exactly one handler
//!
//! # Design Decisions
//! - Immutable once serving; registration takes `&mut self`
//! - Exact match only: no prefixes, parameters or wildcards
//! - Methods are upper-cased at registration and at dispatch
//! - Misconfiguration panics in the builder methods; `try_route` reports it

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::envelope::{ApiError, Request, Response};
use crate::handler::{Context, Handler};

pub const ROUTE_NOT_FOUND: &str = "route not found";

/// Route registration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("route must be provided")]
    EmptyPath,

    #[error("multiple handlers added for: \"{method} {path}\"")]
    Duplicate { method: String, path: String },
}

/// Routes requests to handlers by exact method and path.
#[derive(Default)]
pub struct Mux {
    routes: HashSet<String>,
    method_routes: HashMap<String, HashSet<String>>,
    handlers: HashMap<(String, String), Box<dyn Handler>>,
}

impl Mux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` and `path`.
    pub fn try_route(
        &mut self,
        method: &str,
        path: &str,
        handler: impl Handler + 'static,
    ) -> Result<(), RouteError> {
        if path.is_empty() {
            return Err(RouteError::EmptyPath);
        }

        let method = method.to_ascii_uppercase();
        let key = (method.clone(), path.to_string());
        if self.handlers.contains_key(&key) {
            return Err(RouteError::Duplicate {
                method,
                path: path.to_string(),
            });
        }

        tracing::debug!(method = %method, path = %path, "Route registered");

        self.routes.insert(path.to_string());
        self.method_routes
            .entry(method)
            .or_default()
            .insert(path.to_string());
        self.handlers.insert(key, Box::new(handler));
        Ok(())
    }

    /// Register a route, panicking on misconfiguration.
    pub fn route(mut self, method: &str, path: &str, handler: impl Handler + 'static) -> Self {
        if let Err(e) = self.try_route(method, path, handler) {
            panic!("{e}");
        }
        self
    }

    pub fn get(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.route("GET", path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.route("POST", path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.route("PUT", path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.route("PATCH", path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.route("DELETE", path, handler)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl Handler for Mux {
    async fn handle(&self, ctx: Context, mut req: Request) -> Response {
        if req.path.is_empty() {
            req.path = "/".to_string();
        }
        req.method.make_ascii_uppercase();

        if !self.routes.contains(&req.path) {
            return Response {
                errors: vec![ApiError::new(404, ROUTE_NOT_FOUND)],
                ..Response::default()
            };
        }

        let allowed = self
            .method_routes
            .get(&req.method)
            .is_some_and(|paths| paths.contains(&req.path));
        let handler = allowed
            .then(|| self.handlers.get(&(req.method.clone(), req.path.clone())))
            .flatten();

        match handler {
            Some(h) => h.handle(ctx, req).await,
            None => Response {
                errors: vec![ApiError::new(405, "method not allowed")],
                ..Response::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;

    fn echo(tag: &'static str) -> impl Handler {
        handler_fn(move |_ctx, _req| async move { Response::json(tag) })
    }

    fn mux() -> Mux {
        Mux::new().get("/x", echo("get-x")).post("/x", echo("post-x")).get("/", echo("root"))
    }

    async fn dispatch(m: &Mux, method: &str, path: &str) -> Response {
        m.handle(Context::background(), Request::new(method, path)).await
    }

    #[tokio::test]
    async fn wrong_method_is_not_allowed() {
        let resp = dispatch(&mux(), "DELETE", "/x").await;
        assert_eq!(resp.errors, vec![ApiError::new(405, "method not allowed")]);
        assert_eq!(resp.status_code(), 405);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let resp = dispatch(&mux(), "GET", "/y").await;
        assert_eq!(resp.errors, vec![ApiError::new(404, "route not found")]);
    }

    #[tokio::test]
    async fn exact_match_invokes_handler() {
        let resp = dispatch(&mux(), "GET", "/x").await;
        assert!(resp.errors.is_empty());
        assert_eq!(resp.status_code(), 200);
    }

    #[tokio::test]
    async fn no_prefix_matching() {
        let resp = dispatch(&mux(), "GET", "/x/sub").await;
        assert_eq!(resp.status_code(), 404);
    }

    #[tokio::test]
    async fn empty_path_routes_to_root() {
        let resp = dispatch(&mux(), "GET", "").await;
        assert!(resp.errors.is_empty());
    }

    #[tokio::test]
    async fn method_matching_ignores_case() {
        let m = Mux::new().route("get", "/lower", echo("lower"));
        for method in ["get", "GET", "Get"] {
            let resp = dispatch(&m, method, "/lower").await;
            assert!(resp.errors.is_empty(), "{method}: {:?}", resp.errors);
        }

        let resp = dispatch(&mux(), "post", "/x").await;
        assert!(resp.errors.is_empty());
    }

    #[tokio::test]
    async fn handler_sees_upper_cased_method() {
        let m = Mux::new().get(
            "/m",
            handler_fn(|_ctx, req| async move { Response::json(req.method) }),
        );
        let env = crate::envelope::to_envelope(dispatch(&m, "get", "/m").await);
        assert_eq!(env.body, Some(serde_json::json!("GET")));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut m = mux();
        let err = m.try_route("GET", "/x", echo("again")).unwrap_err();
        assert_eq!(
            err,
            RouteError::Duplicate {
                method: "GET".into(),
                path: "/x".into()
            }
        );
    }

    #[test]
    fn empty_path_registration_fails() {
        let mut m = Mux::new();
        assert_eq!(m.try_route("GET", "", echo("x")).unwrap_err(), RouteError::EmptyPath);
    }

    #[test]
    #[should_panic(expected = "multiple handlers added for")]
    fn builder_panics_on_duplicate() {
        let _ = mux().get("/x", echo("dup"));
    }
}
