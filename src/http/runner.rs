//! The `http` runner strategy.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;

use crate::config::RuntimeSettings;
use crate::handler::Handler;
use crate::http::healthz::Healthz;
use crate::http::server::HttpServer;
use crate::lifecycle::{Runner, Shutdown, StartupError};

/// Serves the handler over HTTP on `0.0.0.0:$PORT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpRunner;

#[async_trait]
impl Runner for HttpRunner {
    async fn run(
        &self,
        settings: &RuntimeSettings,
        shutdown: Shutdown,
        handler: Arc<dyn Handler>,
    ) -> Result<(), StartupError> {
        let addr = settings.bind_address();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })?;

        let handler: Arc<dyn Handler> = Arc::new(Healthz::new(handler, settings.function.build_version));
        HttpServer::new(handler, settings, shutdown)
            .run(listener)
            .await
            .map_err(StartupError::Serve)
    }
}
