//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate runtime settings
//! - Select the runner and config loader from the [`Registry`]
//! - Read the function config and build the handler graph
//! - Hand the handler to the runner and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast on misconfiguration of the runtime itself
//! - A bad function config does not stop the runtime: every request is
//!   answered with the config error until restart
//! - The handler constructor runs under a panic boundary

use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::validation::ValidationError;
use crate::config::{read_config, ConfigLoader, EnvConfigLoader, FnConfig, FsConfigLoader, RuntimeSettings};
use crate::envelope::ApiError;
use crate::handler::{error_handler, Handler};
use crate::http::HttpRunner;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::logging::panic_message;

/// Registration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} type already exists: {name:?}")]
    Duplicate { kind: &'static str, name: String },
}

/// Startup failures. Each one is fatal.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid runtime settings: {}", join(.0))]
    InvalidSettings(Vec<ValidationError>),

    #[error("unmatched runner type provided: {0:?}")]
    UnknownRunner(String),

    #[error("unmatched config loader type provided: {0:?}")]
    UnknownLoader(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected shutdown of server: {0}")]
    Serve(#[source] std::io::Error),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A transport serving a handler until shutdown.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(
        &self,
        settings: &RuntimeSettings,
        shutdown: Shutdown,
        handler: Arc<dyn Handler>,
    ) -> Result<(), StartupError>;
}

/// Named runner and config loader strategies.
pub struct Registry {
    runners: HashMap<String, Arc<dyn Runner>>,
    loaders: HashMap<String, Arc<dyn ConfigLoader>>,
}

impl Registry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            runners: HashMap::new(),
            loaders: HashMap::new(),
        }
    }

    /// Runner `http`, loaders `fs` and `env`.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.runners.insert("http".to_string(), Arc::new(HttpRunner));
        registry.loaders.insert("fs".to_string(), Arc::new(FsConfigLoader));
        registry.loaders.insert("env".to_string(), Arc::new(EnvConfigLoader::new()));
        registry
    }

    pub fn register_runner(
        &mut self,
        name: impl Into<String>,
        runner: impl Runner + 'static,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.runners.contains_key(&name) {
            return Err(RegistryError::Duplicate { kind: "runner", name });
        }
        self.runners.insert(name, Arc::new(runner));
        Ok(())
    }

    pub fn register_loader(
        &mut self,
        name: impl Into<String>,
        loader: impl ConfigLoader + 'static,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.loaders.contains_key(&name) {
            return Err(RegistryError::Duplicate {
                kind: "config loader",
                name,
            });
        }
        self.loaders.insert(name, Arc::new(loader));
        Ok(())
    }

    pub fn runner(&self, name: &str) -> Option<Arc<dyn Runner>> {
        self.runners.get(name).cloned()
    }

    pub fn loader(&self, name: &str) -> Option<Arc<dyn ConfigLoader>> {
        self.loaders.get(name).cloned()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read the function config and build the handler graph.
///
/// Config failures and constructor panics yield a handler answering every
/// request with the corresponding error.
pub async fn build_handler<C, F, H>(
    registry: &Registry,
    settings: &RuntimeSettings,
    new_handler: F,
) -> Result<Arc<dyn Handler>, StartupError>
where
    C: FnConfig,
    F: FnOnce(C) -> H,
    H: Handler + 'static,
{
    let cfg = match C::skipped() {
        Some(cfg) => Ok(cfg),
        None => {
            let loader = registry
                .loader(&settings.config_loader)
                .ok_or_else(|| StartupError::UnknownLoader(settings.config_loader.clone()))?;
            read_config::<C>(loader.as_ref(), settings).await
        }
    };

    let cfg = match cfg {
        Ok(cfg) => cfg,
        Err(failure) => {
            tracing::error!(err = %failure, "Failed to read function config");
            return Ok(Arc::new(error_handler([failure.api])));
        }
    };

    match std::panic::catch_unwind(AssertUnwindSafe(|| new_handler(cfg))) {
        Ok(handler) => Ok(Arc::new(handler)),
        Err(payload) => {
            tracing::error!(panic = %panic_message(payload.as_ref()), "Panic while building handler");
            Ok(Arc::new(error_handler([ApiError::new(
                503,
                "encountered unexpected error",
            )])))
        }
    }
}

/// Start the runtime: build the handler and serve it until shutdown.
pub async fn run<C, F, H>(
    registry: &Registry,
    settings: RuntimeSettings,
    shutdown: Shutdown,
    new_handler: F,
) -> Result<(), StartupError>
where
    C: FnConfig,
    F: FnOnce(C) -> H,
    H: Handler + 'static,
{
    settings.validate().map_err(StartupError::InvalidSettings)?;

    let runner = registry
        .runner(&settings.runner)
        .ok_or_else(|| StartupError::UnknownRunner(settings.runner.clone()))?;

    let handler = build_handler::<C, F, H>(registry, &settings, new_handler).await?;

    tracing::info!(
        runner = %settings.runner,
        config_loader = %settings.config_loader,
        fn_id = %settings.function.id,
        fn_version = settings.function.version,
        "Function runtime starting"
    );

    runner.run(&settings, shutdown, handler).await
}
