//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use fn_runtime::config::{FunctionIdentity, RuntimeSettings};
use fn_runtime::envelope::{Envelope, ResponseEnvelope};
use fn_runtime::handler::Handler;
use fn_runtime::http::{Healthz, HttpServer};
use fn_runtime::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A function served on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Trigger shutdown and wait for the server to stop.
    #[allow(dead_code)]
    pub async fn stop(self) -> std::io::Result<()> {
        self.shutdown.trigger();
        self.task.await.unwrap()
    }
}

pub fn settings(output_dir: &Path) -> RuntimeSettings {
    RuntimeSettings {
        output_dir: output_dir.to_path_buf(),
        shutdown_grace_secs: 2,
        function: FunctionIdentity {
            id: "fn-test".into(),
            version: 5,
            build_version: 7,
        },
        ..RuntimeSettings::default()
    }
}

/// Start `handler` behind the HTTP transport, wrapped the way the http
/// runner wraps it.
pub async fn start_server(handler: impl Handler + 'static, settings: &RuntimeSettings) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handler: Arc<dyn Handler> = Arc::new(Healthz::new(handler, settings.function.build_version));
    let server = HttpServer::new(handler, settings, shutdown.clone());
    let task = tokio::spawn(server.run(listener));

    TestServer {
        addr,
        shutdown,
        task,
    }
}

/// POST an envelope and return the status and decoded response envelope.
pub async fn invoke(server: &TestServer, envelope: &Envelope) -> (u16, ResponseEnvelope) {
    let res = reqwest::Client::new()
        .post(server.url())
        .json(envelope)
        .send()
        .await
        .unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}
