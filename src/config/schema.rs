//! Runtime settings definitions.
//!
//! Settings come from the process environment. Every field has a default so
//! a bare environment yields a working runtime on port 8081.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::ValidationError;

pub const ENV_PORT: &str = "PORT";
pub const ENV_CONFIG_PATH: &str = "CS_FN_CONFIG_PATH";
pub const ENV_CONFIG_LOADER: &str = "CS_CONFIG_LOADER_TYPE";
pub const ENV_RUNNER: &str = "CS_RUNNER_TYPE";
pub const ENV_FN_ID: &str = "CS_FN_ID";
pub const ENV_FN_VERSION: &str = "CS_FN_VERSION";
pub const ENV_FN_BUILD_VERSION: &str = "CS_FN_BUILD_VERSION";
pub const ENV_OUTPUT_DIR: &str = "CS_FN_OUTPUT_DIR";
pub const ENV_METRICS_ADDRESS: &str = "METRICS_ADDRESS";

pub const DEFAULT_PORT: u16 = 8081;

/// Root settings for the function runtime.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Listening port.
    pub port: u16,

    /// Function config source for the `fs` loader.
    pub config_path: Option<PathBuf>,

    /// Name of the registered config loader.
    pub config_loader: String,

    /// Name of the registered runner.
    pub runner: String,

    pub function: FunctionIdentity,

    /// Directory materialized files are written into.
    pub output_dir: PathBuf,

    /// Prometheus exporter address; disabled when unset.
    pub metrics_address: Option<String>,

    pub shutdown_grace_secs: u64,

    /// Ceiling for JSON envelopes.
    pub max_json_bytes: usize,

    /// Ceiling for multipart submissions.
    pub max_multipart_bytes: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            config_path: None,
            config_loader: "fs".to_string(),
            runner: "http".to_string(),
            function: FunctionIdentity::default(),
            output_dir: PathBuf::from("."),
            metrics_address: None,
            shutdown_grace_secs: 15,
            max_json_bytes: crate::envelope::codec::MAX_JSON_BYTES,
            max_multipart_bytes: 32 << 20,
        }
    }
}

/// Identity reported by the healthz fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FunctionIdentity {
    pub id: String,
    pub version: i64,
    pub build_version: i64,
}

impl RuntimeSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset or blank variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Self::default();

        if let Some(port) = get(ENV_PORT).and_then(|v| v.parse::<u16>().ok()).filter(|p| *p > 0) {
            settings.port = port;
        }
        settings.config_path = get(ENV_CONFIG_PATH).map(PathBuf::from);
        if let Some(loader) = get(ENV_CONFIG_LOADER) {
            settings.config_loader = loader;
        }
        if let Some(runner) = get(ENV_RUNNER) {
            settings.runner = runner;
        }
        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            settings.output_dir = PathBuf::from(dir);
        }
        settings.metrics_address = get(ENV_METRICS_ADDRESS);

        settings.function = FunctionIdentity {
            id: get(ENV_FN_ID).unwrap_or_default(),
            version: get(ENV_FN_VERSION).and_then(|v| v.parse().ok()).unwrap_or(0),
            build_version: get(ENV_FN_BUILD_VERSION)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        };

        settings
    }

    /// Semantic checks; returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.runner.is_empty() {
            errors.push(ValidationError::new("runner", "must not be empty"));
        }
        if self.config_loader.is_empty() {
            errors.push(ValidationError::new("config_loader", "must not be empty"));
        }
        if self.max_json_bytes == 0 {
            errors.push(ValidationError::new("max_json_bytes", "must be greater than zero"));
        }
        if self.max_multipart_bytes == 0 {
            errors.push(ValidationError::new("max_multipart_bytes", "must be greater than zero"));
        }
        if self.function.version < 0 {
            errors.push(ValidationError::new("function.version", "must not be negative"));
        }
        if let Some(addr) = &self.metrics_address {
            if addr.parse::<SocketAddr>().is_err() {
                errors.push(ValidationError::new(
                    "metrics_address",
                    format!("invalid socket address {addr:?}"),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn metrics_socket(&self) -> Option<SocketAddr> {
        self.metrics_address.as_deref().and_then(|a| a.parse().ok())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
