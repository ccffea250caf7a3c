use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod api;
mod config;
mod error;
mod export;
mod i18n;
mod ingestion;
mod ocr;
mod ollama;
mod pipeline;
mod service;
mod websocket;

use crate::config::RuntimeConfig;
use crate::service::ImageToTextService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!(
        "Starting ImageToText Pro service v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Layered config: optional config file, then IMAGETOTEXT__* environment
    let runtime_config = Arc::new(RuntimeConfig::load()?);
    info!(
        host = %runtime_config.static_config.server.host,
        port = runtime_config.static_config.server.port,
        ocr_model = %runtime_config.dynamic().ollama.ocr_model,
        auto_extract = runtime_config.dynamic().pipeline.auto_extract,
        "Configuration loaded"
    );

    // Metrics recorder; the service keeps running without one
    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    };

    let service = Arc::new(ImageToTextService::new(runtime_config.clone()).await?);

    let app = api::router(service, metrics);

    let addr = format!(
        "{}:{}",
        runtime_config.static_config.server.host, runtime_config.static_config.server.port
    );
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("imagetotext_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
