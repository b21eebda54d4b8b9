//! Side effects performed by the protocol stages

use crate::ProtocolConfig;
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("location service unavailable: {0}")]
    Location(String),

    #[error("emergency services unreachable: {0}")]
    Services(String),

    #[error("could not reach {contact}: {reason}")]
    Contact { contact: String, reason: String },
}

/// Stage I/O for the emergency protocol
#[async_trait]
pub trait EmergencyActions: Send + Sync {
    /// Resolve the vehicle's current location
    async fn locate(&self) -> Result<String, ActionError>;

    /// Contact emergency services; returns the dispatch ETA in minutes
    async fn notify_services(&self, location: Option<&str>) -> Result<u32, ActionError>;

    /// Alert a single emergency contact
    async fn notify_contact(&self, contact: &str) -> Result<(), ActionError>;
}

/// Simulated actions: always succeed with configured values
#[derive(Debug, Clone)]
pub struct SimulatedActions {
    location: String,
    eta_minutes: u32,
}

impl SimulatedActions {
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            location: config.location.clone(),
            eta_minutes: config.eta_minutes,
        }
    }
}

impl Default for SimulatedActions {
    fn default() -> Self {
        Self::new(&ProtocolConfig::default())
    }
}

#[async_trait]
impl EmergencyActions for SimulatedActions {
    async fn locate(&self) -> Result<String, ActionError> {
        Ok(self.location.clone())
    }

    async fn notify_services(&self, location: Option<&str>) -> Result<u32, ActionError> {
        info!("Simulated dispatch to {}", location.unwrap_or("unknown location"));
        Ok(self.eta_minutes)
    }

    async fn notify_contact(&self, contact: &str) -> Result<(), ActionError> {
        info!("Simulated alert to {}", contact);
        Ok(())
    }
}
