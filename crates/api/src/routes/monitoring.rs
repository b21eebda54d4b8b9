//! Monitoring Routes

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct MonitoringResponse {
    pub monitoring: bool,
    /// False when the request did not change anything
    pub changed: bool,
}

/// Start the sampling loop
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<MonitoringResponse>, ApiError> {
    let was_running = state.monitor.is_monitoring().await;
    state.monitor.start_monitoring().await?;
    Ok(Json(MonitoringResponse {
        monitoring: true,
        changed: !was_running,
    }))
}

/// Stop the sampling loop and release the camera
pub async fn stop(State(state): State<Arc<AppState>>) -> Json<MonitoringResponse> {
    let changed = state.monitor.stop_monitoring().await;
    Json(MonitoringResponse {
        monitoring: false,
        changed,
    })
}
