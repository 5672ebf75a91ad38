//! Reference function served by the runtime.
//!
//! ```text
//!   GET  /echo   → echoes method, path, query, headers and context
//!   POST /files  → writes {filename, content, gzip} to the output directory
//!   GET  /healthz (fallback) → function identity
//! ```
//!
//! Environment: see `RuntimeSettings` (`PORT`, `CS_FN_*`, `METRICS_ADDRESS`);
//! `RUST_LOG` and `LOG_FORMAT` control logging.

use fn_runtime::body::{compress_gzip, File};
use fn_runtime::config::{RuntimeSettings, SkipCfg};
use fn_runtime::envelope::{ApiError, RequestOf, Response};
use fn_runtime::handler::{handler_fn, validated, Validate};
use fn_runtime::lifecycle::{self, signals, Registry, Shutdown};
use fn_runtime::observability::logging::{init_logging, LogFormat};
use fn_runtime::observability::metrics::init_metrics;
use fn_runtime::routing::Mux;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct WriteFile {
    filename: String,
    content: String,
    #[serde(default)]
    gzip: bool,
}

impl Validate for WriteFile {
    fn ok(&self) -> Vec<ApiError> {
        let mut errs = Vec::new();
        if self.filename.is_empty() {
            errs.push(ApiError::bad_request("filename is required"));
        }
        if self.content.is_empty() {
            errs.push(ApiError::bad_request("content is required"));
        }
        errs
    }
}

fn function(_cfg: SkipCfg) -> Mux {
    Mux::new()
        .get(
            "/echo",
            handler_fn(|ctx, req| async move {
                Response::json(json!({
                    "method": req.method,
                    "path": req.path,
                    "query": req.query,
                    "headers": req.headers,
                    "context": req.context,
                    "trace_id": ctx.trace_id(),
                }))
            }),
        )
        .post(
            "/files",
            validated(|_ctx, req: RequestOf<WriteFile>| async move {
                let WriteFile {
                    filename,
                    content,
                    gzip,
                } = req.body;
                let mut file = File::from_bytes(content).with_filename(filename);
                if gzip {
                    file = compress_gzip(file);
                }
                Response::file(file)
            }),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LogFormat::from_env());

    let settings = RuntimeSettings::from_env();
    tracing::info!(
        port = settings.port,
        output_dir = %settings.output_dir.display(),
        "fn-runtime v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if let Some(addr) = settings.metrics_socket() {
        if let Err(e) = init_metrics(addr) {
            tracing::error!(err = %e, "Failed to start metrics exporter");
        }
    }

    let shutdown = Shutdown::new();
    let signal_task = signals::listen(shutdown.clone());

    let result = lifecycle::run(&Registry::new(), settings, shutdown.clone(), function).await;

    shutdown.trigger();
    let _ = signal_task.await;

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}
