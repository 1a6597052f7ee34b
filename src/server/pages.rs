//! Site routes.
//!
//! Deliberately thin: page rendering is an external collaborator here, and
//! everything interesting about this server lives in the telemetry pipeline
//! observing these routes.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};

pub(super) async fn home() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html>\n<html>\n<head><title>sitelog</title></head>\n\
         <body><h1>sitelog</h1><p>Request telemetry demo server.</p>\
         <p><a href=\"/about\">About</a></p></body>\n</html>",
    )
}

pub(super) async fn about() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html>\n<html>\n<head><title>About - sitelog</title></head>\n\
         <body><h1>About</h1><p>Every request to this server is encoded into a \
         compact telemetry record.</p></body>\n</html>",
    )
}

pub(super) async fn healthy() -> &'static str {
    "OK"
}

pub(super) async fn fallback() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html("<h1>404 Not Found</h1>"))
}
