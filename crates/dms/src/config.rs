//! DMS configuration

use serde::{Deserialize, Serialize};

/// Detection state machine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Label counted as a distraction
    pub target_class: String,

    /// Detections must score strictly above this to count
    pub min_score: f64,

    /// Scores strictly above this raise a High alert
    pub high_score: f64,

    /// Unchanged state is still logged after this long (milliseconds)
    pub history_interval_ms: u64,

    /// Maximum history entries kept
    pub history_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            target_class: "cell phone".to_string(),
            min_score: 0.50,
            high_score: 0.80,
            history_interval_ms: 3000,
            history_capacity: 10,
        }
    }
}
