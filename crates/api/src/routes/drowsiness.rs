//! Drowsiness Escalation Routes

use alerting::EscalationState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EscalationResponse {
    pub count: u32,
    pub last_event_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_triggered: Option<bool>,
}

impl From<EscalationState> for EscalationResponse {
    fn from(state: EscalationState) -> Self {
        Self {
            count: state.count,
            last_event_at: state.last_event_at,
            emergency_triggered: None,
        }
    }
}

/// Record a drowsiness event
pub async fn trigger(State(state): State<Arc<AppState>>) -> Json<EscalationResponse> {
    let outcome = state.monitor.report_drowsiness();
    Json(EscalationResponse {
        emergency_triggered: Some(outcome.emergency_triggered),
        ..EscalationResponse::from(outcome.state)
    })
}

/// Driver acknowledged the drowsiness alert
pub async fn acknowledge(State(state): State<Arc<AppState>>) -> Json<EscalationResponse> {
    Json(state.monitor.acknowledge_drowsiness().into())
}

pub async fn reset(State(state): State<Arc<AppState>>) -> Json<EscalationResponse> {
    Json(state.monitor.reset_drowsiness().into())
}
