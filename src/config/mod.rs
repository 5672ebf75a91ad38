//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → schema.rs (RuntimeSettings: port, loader, runner, identity, limits)
//!     → validation.rs (semantic checks on settings)
//!
//! function config source (file or $FN_CONFIG)
//!     → loader.rs (fs / env strategy, TOML converted to JSON)
//!     → validation.rs (decode into C, C::ok)
//!     → C handed to the handler constructor, or one ApiError served to
//!       every request
//! ```
//!
//! # Design Decisions
//! - Settings and function config are immutable once loaded
//! - All settings have defaults to allow a bare environment
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, ConfigLoader, EnvConfigLoader, FsConfigLoader};
pub use schema::{FunctionIdentity, RuntimeSettings};
pub use validation::{read_config, ConfigErrors, ConfigFailure, FnConfig, SkipCfg, ValidationError};
