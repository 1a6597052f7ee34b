//! Request-telemetry capture middleware.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use super::http::AppState;
use super::metrics::{HttpMethod, RequestLabels};
use crate::model::Exchange;

/// Observes every exchange: captures request metadata up front, lets the
/// response complete, then hands one [`Exchange`] to the logger. The only
/// cost on the request path is encoding and an in-memory push; telemetry
/// faults never affect response delivery.
pub(super) async fn capture(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    state.metrics.http_requests_in_flight.inc();

    let method = request.method().clone();
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let query_param_count = request.uri().query().map(count_query_params).unwrap_or(0);
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_default();
    let user_agent = header_value(&request, header::USER_AGENT);
    let referrer = header_value(&request, header::REFERER);
    let content_type = optional_header_value(&request, header::CONTENT_TYPE);
    let host = match header_value(&request, header::HOST) {
        host if host.is_empty() => request.uri().host().unwrap_or_default().to_string(),
        host => host,
    };

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status().as_u16();
    let response_size = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    state.metrics.http_requests_in_flight.dec();
    state
        .metrics
        .http_requests
        .get_or_create(&RequestLabels {
            method: HttpMethod::from(&method),
            status,
        })
        .inc();

    // Console channel: every exchange in development, server faults only in
    // production.
    if state.environment.is_production() {
        if status >= 500 {
            tracing::error!(%method, url, status, ms = duration.as_millis() as u64, "server fault");
        }
    } else {
        tracing::info!(%method, url, status, ms = duration.as_millis() as u64, "request");
    }

    let exchange = Exchange {
        method: method.to_string(),
        url,
        status,
        duration,
        response_size,
        client_addr,
        user_agent,
        referrer,
        content_type,
        query_param_count,
        host,
    };
    state.logger.record(&exchange).await;

    response
}

fn header_value(request: &Request, name: header::HeaderName) -> String {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn optional_header_value(request: &Request, name: header::HeaderName) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn count_query_params(query: &str) -> u32 {
    query.split('&').filter(|pair| !pair.is_empty()).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_count_query_params() {
        assert_eq!(count_query_params("a=1&b=2&c"), 3);
        assert_eq!(count_query_params("a=1"), 1);
        assert_eq!(count_query_params(""), 0);
        assert_eq!(count_query_params("&&"), 0);
    }
}
