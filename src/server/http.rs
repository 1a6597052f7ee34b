//! HTTP server assembly and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use tokio::signal;

use super::config::ServerConfig;
use super::inspect;
use super::metrics::Metrics;
use super::middleware;
use super::pages;
use crate::config::Environment;
use crate::logger::TelemetryLogger;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub logger: Arc<TelemetryLogger>,
    pub metrics: Arc<Metrics>,
    pub environment: Environment,
}

/// Builds the full router: site pages, the metrics endpoint, and the
/// inspection API, with the telemetry capture middleware over everything.
///
/// The inspection routes are mounted in both environments, but in production
/// every one of them serves a fixed not-found response regardless of input.
pub fn build_router(state: AppState) -> Router {
    let inspection = match state.environment {
        Environment::Development => Router::new()
            .route("/api/logs/stats", get(inspect::handle_stats))
            .route("/api/logs/recent", get(inspect::handle_recent))
            .route("/api/logs/download", get(inspect::handle_download)),
        Environment::Production => Router::new()
            .route("/api/logs/stats", get(inspect::handle_disabled))
            .route("/api/logs/recent", get(inspect::handle_disabled))
            .route("/api/logs/download", get(inspect::handle_disabled)),
    };

    Router::new()
        .route("/", get(pages::home))
        .route("/about", get(pages::about))
        .route("/-/healthy", get(pages::healthy))
        .merge(inspection)
        .route("/metrics", get(handle_metrics))
        .fallback(pages::fallback)
        .layer(from_fn_with_state(state.clone(), middleware::capture))
        .with_state(state)
}

/// Handle GET /metrics
async fn handle_metrics(State(state): State<AppState>) -> String {
    state.metrics.encode()
}

/// The sitelog HTTP server.
pub struct AppServer {
    state: AppState,
    config: ServerConfig,
}

impl AppServer {
    /// Wires the logger's metrics into a fresh registry and assembles the
    /// shared state.
    pub fn new(logger: Arc<TelemetryLogger>, config: ServerConfig) -> Self {
        let mut metrics = Metrics::new();
        logger.register_metrics(metrics.registry_mut());
        let state = AppState {
            logger,
            metrics: Arc::new(metrics),
            environment: config.environment,
        };
        Self { state, config }
    }

    /// Runs the server until a shutdown signal arrives, then flushes the
    /// telemetry logger within its grace period before returning.
    pub async fn run(self) -> crate::Result<()> {
        let app = build_router(self.state.clone());
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        tracing::info!("starting sitelog server on {addr}");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        self.state.logger.shutdown().await;
        tracing::info!("server shut down gracefully");
        Ok(())
    }
}

/// Listen for SIGTERM and SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}
