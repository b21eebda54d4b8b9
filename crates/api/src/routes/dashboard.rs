//! Dashboard Routes

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dms::HistoryEntry;
use monitor::MonitorStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;

/// Full dashboard state
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: MonitorStatus,
    /// Most recent user-visible errors, oldest first
    pub recent_errors: Vec<String>,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = state.monitor.status().await;
    let recent_errors = state.dashboard.snapshot().errors.into_iter().collect();
    Json(StatusResponse { status, recent_errors })
}

/// Query parameters for the history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of entries
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub data: Vec<HistoryEntry>,
    pub count: usize,
}

/// Detection history, most recent first
pub async fn history(State(state): State<Arc<AppState>>, Query(params): Query<HistoryQuery>) -> Json<HistoryResponse> {
    let mut data = state.monitor.history();
    if let Some(limit) = params.limit {
        data.truncate(limit);
    }
    Json(HistoryResponse {
        count: data.len(),
        data,
    })
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
