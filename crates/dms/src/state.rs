//! Driver distraction state

use frame_classifier::BoundingBox;
use serde::{Deserialize, Serialize};

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    None,
    Medium,
    High,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
        }
    }
}

/// Current phone-use state, replaced after every classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionState {
    /// Target object seen in the latest frame
    pub is_detected: bool,

    /// Best score as a rounded percentage (0 when nothing detected)
    pub confidence_percent: u8,

    pub alert_level: AlertLevel,

    /// Box of the highest-scoring detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<BoundingBox>,

    /// Phone held in the lower half of the frame (likely in hand)
    pub in_use: bool,
}
