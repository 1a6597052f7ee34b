//! Development-only log inspection endpoints.
//!
//! Three routes: aggregate stats, the most recent records of a channel, and
//! a validated file download. The surface leaks operational detail, so in
//! production the same paths are mounted onto a handler that returns a fixed
//! not-found body regardless of input.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::http::AppState;
use crate::model::Channel;

const DEFAULT_RECENT_LIMIT: usize = 50;

/// Query parameters for the recent-records endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct RecentParams {
    /// Channel to read: "access" (default) or "error".
    pub channel: Option<String>,
    /// Maximum records to return (capped at 1000).
    pub limit: Option<usize>,
}

/// Query parameters for the download endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct DownloadParams {
    /// Active file name, validated against the exact naming pattern.
    pub file: String,
}

/// Handle GET /api/logs/stats
pub(super) async fn handle_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.logger.stats().await?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

/// Handle GET /api/logs/recent
pub(super) async fn handle_recent(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let channel = match params.channel.as_deref() {
        None | Some("access") => Channel::Access,
        Some("error") => Channel::Error,
        Some(other) => return Err(ApiError::bad_request(format!("unknown channel: {other}"))),
    };
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let records = state.logger.recent(channel, limit).await?;
    Ok(Json(json!({
        "success": true,
        "channel": channel.as_str(),
        "count": records.len(),
        "records": records,
    })))
}

/// Handle GET /api/logs/download
pub(super) async fn handle_download(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    let path = state.logger.resolve_download(&params.file).await?;
    let content = tokio::fs::read(&path)
        .await
        .map_err(|err| ApiError::from(crate::Error::Io(err)))?;

    let disposition = format!("attachment; filename=\"{}\"", params.file);
    Ok((
        [
            (header::CONTENT_TYPE, "application/jsonl".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}

/// Fixed response served on every inspection path in production.
pub(super) async fn handle_disabled() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "message": "Log API endpoints are disabled in production",
        })),
    )
}
