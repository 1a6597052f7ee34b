//! Prometheus metrics for the HTTP server.

use axum::http::Method;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// HTTP method label value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Other,
}

impl From<&Method> for HttpMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => HttpMethod::Get,
            Method::POST => HttpMethod::Post,
            Method::PUT => HttpMethod::Put,
            Method::DELETE => HttpMethod::Delete,
            Method::HEAD => HttpMethod::Head,
            _ => HttpMethod::Other,
        }
    }
}

/// Labels for completed HTTP requests.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub method: HttpMethod,
    pub status: u16,
}

/// The server's metric registry plus its HTTP-level metrics. The telemetry
/// pipeline registers its own counters here at startup.
pub struct Metrics {
    registry: Registry,

    /// Counter of completed HTTP requests.
    pub http_requests: Family<RequestLabels, Counter>,

    /// Gauge of requests currently being processed.
    pub http_requests_in_flight: Gauge,
}

impl Metrics {
    /// Creates the registry with the HTTP metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests = Family::<RequestLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Completed HTTP requests",
            http_requests.clone(),
        );

        let http_requests_in_flight = Gauge::default();
        registry.register(
            "http_requests_in_flight",
            "HTTP requests currently being processed",
            http_requests_in_flight.clone(),
        );

        Self {
            registry,
            http_requests,
            http_requests_in_flight,
        }
    }

    /// Mutable registry access for registering additional metrics (the
    /// telemetry pipeline's counters) before the metrics are shared.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Encodes all metrics to the Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics should not fail");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
