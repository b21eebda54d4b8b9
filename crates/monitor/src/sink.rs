//! Notification sinks
//!
//! A sink renders pipeline state for the driver. Calls arrive from the
//! sampling task and the emergency forwarder and must not block.

use alerting::EscalationState;
use dms::{DetectionState, HistoryEntry};
use emergency::ProtocolSnapshot;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const MAX_ERRORS: usize = 20;

/// Result of one applied classification
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub state: DetectionState,
    /// Most recent first
    pub history: Vec<HistoryEntry>,
    pub history_appended: bool,
    /// Result came from the synthetic fallback
    pub degraded: bool,
    pub frame_sequence: u32,
}

pub trait NotificationSink: Send + Sync {
    fn detection_updated(&self, report: &DetectionReport);
    fn escalation_changed(&self, state: &EscalationState);
    fn protocol_changed(&self, snapshot: &ProtocolSnapshot);
    /// User-visible error
    fn pipeline_error(&self, message: &str);
}

/// Everything a dashboard renders
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSnapshot {
    pub detection: DetectionState,
    pub history: Vec<HistoryEntry>,
    pub degraded: bool,
    pub escalation: EscalationState,
    pub protocol: ProtocolSnapshot,
    pub errors: VecDeque<String>,
    pub detection_updates: u64,
}

/// Keeps the latest state in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshot: Mutex<DashboardSnapshot>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut DashboardSnapshot) -> R) -> R {
        f(&mut self.snapshot.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl NotificationSink for MemorySink {
    fn detection_updated(&self, report: &DetectionReport) {
        self.with(|s| {
            s.detection = report.state.clone();
            s.history = report.history.clone();
            s.degraded = report.degraded;
            s.detection_updates += 1;
        });
    }

    fn escalation_changed(&self, state: &EscalationState) {
        self.with(|s| s.escalation = *state);
    }

    fn protocol_changed(&self, snapshot: &ProtocolSnapshot) {
        self.with(|s| s.protocol = snapshot.clone());
    }

    fn pipeline_error(&self, message: &str) {
        self.with(|s| {
            s.errors.push_back(message.to_string());
            while s.errors.len() > MAX_ERRORS {
                s.errors.pop_front();
            }
        });
    }
}

/// Logs every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn detection_updated(&self, report: &DetectionReport) {
        debug!(
            detected = report.state.is_detected,
            confidence = report.state.confidence_percent,
            alert = report.state.alert_level.as_str(),
            in_use = report.state.in_use,
            degraded = report.degraded,
            "detection updated"
        );
    }

    fn escalation_changed(&self, state: &EscalationState) {
        info!(count = state.count, "drowsiness escalation changed");
    }

    fn protocol_changed(&self, snapshot: &ProtocolSnapshot) {
        if let Some(line) = snapshot.status_log.last() {
            info!(progress = snapshot.progress, state = ?snapshot.state, "{}", line);
        }
    }

    fn pipeline_error(&self, message: &str) {
        warn!("{}", message);
    }
}

/// Forwards to several sinks in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

impl NotificationSink for FanoutSink {
    fn detection_updated(&self, report: &DetectionReport) {
        self.sinks.iter().for_each(|s| s.detection_updated(report));
    }

    fn escalation_changed(&self, state: &EscalationState) {
        self.sinks.iter().for_each(|s| s.escalation_changed(state));
    }

    fn protocol_changed(&self, snapshot: &ProtocolSnapshot) {
        self.sinks.iter().for_each(|s| s.protocol_changed(snapshot));
    }

    fn pipeline_error(&self, message: &str) {
        self.sinks.iter().for_each(|s| s.pipeline_error(message));
    }
}
