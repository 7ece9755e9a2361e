use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mesh_telemetry::config::{load_config, ServiceConfig};
use mesh_telemetry::lifecycle::{wait_for_signal, Shutdown};
use mesh_telemetry::observability::{logging::init_logging, metrics::init_metrics};
use mesh_telemetry::HttpServer;

#[derive(Parser)]
#[command(name = "mesh-telemetry")]
#[command(about = "Instrumented service with trace propagation and health reporting", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    init_logging(&config.observability)?;

    tracing::info!(
        service = %config.service.name,
        version = %config.service.version,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        downstreams = config.downstreams.len(),
        "Configuration loaded"
    );

    let prometheus = if config.observability.metrics_enabled {
        Some(init_metrics()?)
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, prometheus)?;
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
