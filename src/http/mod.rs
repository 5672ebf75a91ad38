//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, body limit)
//!     → envelope codec (JSON or multipart → Request)
//!     → healthz.rs (fallback for unrouted GET /healthz)
//!     → user handler (panic boundary)
//!     → server.rs materialize (file body → written file metadata)
//!     → envelope codec (Response → JSON envelope, status)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - One fallback route: the function's own router decides everything
//! - Transport failures never escape as bare HTTP errors; they are
//!   reported inside a response envelope

pub mod healthz;
pub mod runner;
pub mod server;

pub use healthz::{Healthz, HEALTHZ_PATH};
pub use runner::HttpRunner;
pub use server::{materialize, AppState, HttpServer, X_REQUEST_ID};
