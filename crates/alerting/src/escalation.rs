//! Drowsiness Escalation Tracker

use chrono::{DateTime, Utc};
use clock::Clock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// When the emergency handler fires once the threshold is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Every event at or above the threshold re-arms the emergency workflow
    #[default]
    EveryQualifyingEvent,
    /// Only the event that reaches the threshold fires
    OnCrossing,
}

/// Escalation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Events needed to escalate (default: 3)
    pub threshold: u32,
    /// Inactivity period after which the count resets (seconds, default: 1800)
    pub inactivity_window_secs: u64,
    pub policy: TriggerPolicy,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            inactivity_window_secs: 1800, // 30 minutes
            policy: TriggerPolicy::EveryQualifyingEvent,
        }
    }
}

/// Escalation counter state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EscalationState {
    pub count: u32,
    #[serde(skip)]
    pub last_event_time: Option<Instant>,
    /// Wall-clock time of the last event, for display
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Result of `trigger_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationOutcome {
    pub state: EscalationState,
    /// The emergency handler was invoked
    pub emergency_triggered: bool,
}

/// Callback invoked when escalation fires
pub type EmergencyHandler = Arc<dyn Fn(EscalationState) + Send + Sync>;

/// Drowsiness event counter with a sliding inactivity reset.
///
/// All operations are serialized through an internal mutex. The emergency
/// handler lives in a single slot: the last registration wins.
pub struct EscalationTracker {
    config: EscalationConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<EscalationState>,
    handler: Mutex<Option<EmergencyHandler>>,
}

impl EscalationTracker {
    pub fn new(config: EscalationConfig, clock: Arc<dyn Clock>) -> Self {
        info!(
            "Creating escalation tracker: threshold={}, window={}s, policy={:?}",
            config.threshold, config.inactivity_window_secs, config.policy
        );
        Self {
            config,
            clock,
            state: Mutex::new(EscalationState::default()),
            handler: Mutex::new(None),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.inactivity_window_secs)
    }

    fn expire_if_inactive(&self, state: &mut EscalationState, now: Instant) {
        if let Some(last) = state.last_event_time {
            if now.saturating_duration_since(last) > self.window() && state.count > 0 {
                debug!("Escalation window elapsed, resetting count {} -> 0", state.count);
                state.count = 0;
            }
        }
    }

    /// Driver acknowledged an alert: refresh the window without counting
    pub fn acknowledge(&self) -> EscalationState {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.expire_if_inactive(&mut state, now);
        state.last_event_time = Some(now);
        state.last_event_at = Some(self.clock.wall());
        info!("Drowsiness alert acknowledged (count: {})", state.count);
        *state
    }

    /// Clear the counter
    pub fn reset(&self) -> EscalationState {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = EscalationState::default();
        metrics::gauge!("escalation_count").set(0.0);
        info!("Drowsiness count reset");
        *state
    }

    /// Record a drowsiness event, escalating at the threshold
    pub fn trigger_event(&self) -> EscalationOutcome {
        let now = self.clock.now();
        let (snapshot, fire) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            self.expire_if_inactive(&mut state, now);
            state.count = state.count.saturating_add(1);
            state.last_event_time = Some(now);
            state.last_event_at = Some(self.clock.wall());

            let fire = match self.config.policy {
                TriggerPolicy::EveryQualifyingEvent => state.count >= self.config.threshold,
                TriggerPolicy::OnCrossing => state.count == self.config.threshold,
            };
            (*state, fire)
        };

        metrics::gauge!("escalation_count").set(snapshot.count as f64);
        info!("Drowsiness event recorded (count: {})", snapshot.count);

        let mut emergency_triggered = false;
        if fire {
            // Clone out of the slot so the handler runs without any lock held
            let handler = self.handler.lock().unwrap_or_else(|e| e.into_inner()).clone();
            match handler {
                Some(handler) => {
                    warn!("Drowsiness threshold reached ({}), triggering emergency", snapshot.count);
                    handler(snapshot);
                    emergency_triggered = true;
                }
                None => warn!("Drowsiness threshold reached but no emergency handler registered"),
            }
        }

        EscalationOutcome {
            state: snapshot,
            emergency_triggered,
        }
    }

    /// Register the emergency handler, replacing any previous one
    pub fn set_emergency_handler(&self, handler: EmergencyHandler) {
        let mut slot = self.handler.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            debug!("Replacing emergency handler");
        }
        *slot = Some(handler);
    }

    pub fn clear_emergency_handler(&self) {
        *self.handler.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Current state. The inactivity reset is applied lazily on the next
    /// acknowledge / trigger.
    pub fn state(&self) -> EscalationState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }
}
