//! Driver Monitoring System (DMS)
//!
//! Turns per-frame classification results into driver distraction state:
//! - Phone detection flag and confidence
//! - Alert severity (none / medium / high)
//! - "In use" heuristic from the phone's position in the frame
//! - Bounded, de-duplicated detection history

pub mod config;
pub mod history;
pub mod machine;
pub mod state;

pub use config::DetectionConfig;
pub use history::{DetectionHistory, HistoryEntry};
pub use machine::{evaluate, DetectionMachine, DetectionUpdate, FrameSize};
pub use state::{AlertLevel, DetectionState};
