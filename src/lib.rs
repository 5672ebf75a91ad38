//! Serverless function runtime library.
//!
//! Wraps a user handler in a standard HTTP transport: decodes the JSON (or
//! multipart) request envelope, routes it, runs the handler, writes file
//! responses to disk and encodes the response envelope.

pub mod body;
pub mod config;
pub mod envelope;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod testing;

pub use body::File;
pub use config::{FnConfig, RuntimeSettings, SkipCfg};
pub use envelope::{ApiError, Request, Response};
pub use handler::{handler_fn, Context, Handler};
pub use http::HttpServer;
pub use lifecycle::{run, Registry, Shutdown};
pub use routing::Mux;
