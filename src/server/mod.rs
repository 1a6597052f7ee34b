//! HTTP surface: site routes, telemetry capture middleware, metrics, and the
//! development-only log inspection API.

mod config;
mod error;
mod http;
mod inspect;
mod metrics;
mod middleware;
mod pages;

pub use config::{CliArgs, ServerConfig};
pub use http::{AppServer, AppState, build_router};
pub use metrics::Metrics;
