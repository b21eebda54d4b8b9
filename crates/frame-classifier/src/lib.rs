//! Frame Classifier Client
//!
//! Sends encoded cabin frames to a remote object-detection service and
//! returns labelled bounding boxes. When the service is unreachable, slow,
//! or answers with garbage, the client substitutes a synthetic local result
//! and reports the call as degraded.

mod client;
mod remote;
mod synthetic;
pub mod wire;

pub use client::{ClassificationOutcome, ClassifierClient};
pub use remote::HttpClassifier;
pub use synthetic::SyntheticClassifier;

use async_trait::async_trait;
use camera_capture::EncodedFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors talking to the classification service
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
    #[error("Classifier timed out after {0}ms")]
    Timeout(u64),
    #[error("Classifier returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Classifier reported error: {0}")]
    Remote(String),
    #[error("Malformed classifier response: {0}")]
    Malformed(String),
}

/// Axis-aligned box in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

/// One classified object instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    /// Confidence in [0, 1]
    pub score: f64,
}

/// Result of a liveness probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Anything that can classify a single frame
#[async_trait]
pub trait FrameClassifier: Send + Sync {
    /// Detect objects in one encoded frame
    async fn classify(&self, frame: &EncodedFrame) -> Result<Vec<Detection>, ClassifierError>;

    /// Probe service liveness
    async fn health_check(&self) -> Result<HealthStatus, ClassifierError>;
}

/// Classifier client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Base URL of the detection service
    pub base_url: String,
    /// Label the pipeline is looking for
    pub target_class: String,
    /// Timeout for a classification call (default: 5000)
    pub request_timeout_ms: u64,
    /// Timeout for the health probe (default: 2000)
    pub health_timeout_ms: u64,
    /// Substitute synthetic results when the service fails
    pub fallback_enabled: bool,
    /// Probability that a synthetic result contains a detection
    pub fallback_probability: f64,
    /// Fixed RNG seed for the synthetic classifier
    pub fallback_seed: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            target_class: "cell phone".to_string(),
            request_timeout_ms: 5000,
            health_timeout_ms: 2000,
            fallback_enabled: true,
            fallback_probability: 0.25,
            fallback_seed: None,
        }
    }
}
