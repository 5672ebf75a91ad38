//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (method, path)
//!     → mux.rs (path known? method registered for path?)
//!     → bound Handler, or 404 "route not found" / 405 "method not allowed"
//!
//! Route registration (at startup):
//!     Mux::new().get(..).post(..)
//!     → Freeze inside the handler graph, immutable while serving
//! ```
//!
//! # Design Decisions
//! - Exact match only; the outer platform owns path templating
//! - Deterministic: same (method, path) always reaches the same handler
//! - Unknown path and wrong method are distinct errors

pub mod mux;

pub use mux::{Mux, RouteError, ROUTE_NOT_FOUND};
