//! Emergency Response Protocol
//!
//! Staged SOS workflow: locate the vehicle, contact emergency services,
//! notify the driver's emergency contacts. Runs as a background task with
//! observable progress and a status log, and can be cancelled at any point.

mod actions;
mod protocol;

pub use actions::{ActionError, EmergencyActions, SimulatedActions};
pub use protocol::{EmergencyProtocol, ProtocolError, ProtocolSnapshot, ProtocolState};

use serde::{Deserialize, Serialize};

/// Emergency protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Contacts alerted in order; the first one gets its own stage
    pub contacts: Vec<String>,
    /// Location reported by the simulated locator
    pub location: String,
    /// Dispatch ETA reported by the simulated emergency services (minutes)
    pub eta_minutes: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            contacts: vec!["Family Member 1".to_string(), "Family Member 2".to_string()],
            location: "Sample Location, City".to_string(),
            eta_minutes: 8,
        }
    }
}
