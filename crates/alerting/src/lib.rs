//! Alerting System
//!
//! Counts drowsiness events inside a sliding inactivity window and escalates
//! to the registered emergency handler once the threshold is reached.

mod escalation;

pub use escalation::{
    EmergencyHandler, EscalationConfig, EscalationOutcome, EscalationState, EscalationTracker, TriggerPolicy,
};
