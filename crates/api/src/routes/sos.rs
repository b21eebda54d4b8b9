//! Emergency SOS Routes

use axum::{extract::State, http::StatusCode, Json};
use emergency::ProtocolSnapshot;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct SosResponse {
    pub run_id: Uuid,
}

/// Manually start the emergency protocol
pub async fn activate(State(state): State<Arc<AppState>>) -> Result<(StatusCode, Json<SosResponse>), ApiError> {
    let run_id = state.monitor.activate_sos()?;
    Ok((StatusCode::ACCEPTED, Json(SosResponse { run_id })))
}

pub async fn cancel(State(state): State<Arc<AppState>>) -> Json<ProtocolSnapshot> {
    Json(state.monitor.cancel_sos())
}
