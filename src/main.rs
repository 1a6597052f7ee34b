//! sitelog server binary entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sitelog::TelemetryLogger;
use sitelog::server::{AppServer, CliArgs, ServerConfig};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    let telemetry_config = args.to_telemetry_config();
    let server_config = ServerConfig::from(&args);

    tracing::info!(?telemetry_config, "opening telemetry logger");

    let logger = TelemetryLogger::open(telemetry_config)
        .await
        .expect("failed to open telemetry logger");

    let server = AppServer::new(Arc::new(logger), server_config);
    if let Err(err) = server.run().await {
        tracing::error!(%err, "server exited with error");
    }
}
