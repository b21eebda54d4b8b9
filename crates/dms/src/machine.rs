//! Detection state machine

use crate::history::{DetectionHistory, HistoryEntry};
use crate::state::{AlertLevel, DetectionState};
use crate::DetectionConfig;
use clock::Clock;
use frame_classifier::Detection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Frame dimensions the detections refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Result of feeding one classification into the machine
#[derive(Debug, Clone, Serialize)]
pub struct DetectionUpdate {
    pub state: DetectionState,
    /// A history entry was appended by this update
    pub history_appended: bool,
}

/// Derives [`DetectionState`] from classification results and keeps the
/// detection history.
pub struct DetectionMachine {
    config: DetectionConfig,
    state: DetectionState,
    history: DetectionHistory,
    clock: Arc<dyn Clock>,
}

/// Compute the state for one set of detections (no history involved)
pub fn evaluate(config: &DetectionConfig, detections: &[Detection], frame: FrameSize) -> DetectionState {
    let best = detections
        .iter()
        .filter(|d| d.label == config.target_class && d.score > config.min_score)
        .max_by(|a, b| a.score.total_cmp(&b.score));

    match best {
        None => DetectionState::default(),
        Some(d) => {
            let alert_level = if d.score > config.high_score {
                AlertLevel::High
            } else {
                AlertLevel::Medium
            };

            DetectionState {
                is_detected: true,
                confidence_percent: (d.score * 100.0).round().clamp(1.0, 100.0) as u8,
                alert_level,
                position: Some(d.bbox),
                in_use: d.bbox.center_y() > frame.height as f64 / 2.0,
            }
        }
    }
}

impl DetectionMachine {
    pub fn new(config: DetectionConfig, clock: Arc<dyn Clock>) -> Self {
        let history = DetectionHistory::new(
            config.history_capacity,
            Duration::from_millis(config.history_interval_ms),
        );
        Self {
            config,
            state: DetectionState::default(),
            history,
            clock,
        }
    }

    /// Apply one classification result
    pub fn apply(&mut self, detections: &[Detection], frame: FrameSize) -> DetectionUpdate {
        let state = evaluate(&self.config, detections, frame);

        if state.alert_level != self.state.alert_level {
            info!(
                "Alert level {} -> {} (confidence {}%)",
                self.state.alert_level.as_str(),
                state.alert_level.as_str(),
                state.confidence_percent
            );
        }

        let history_appended = self.history.record(HistoryEntry {
            detected: state.is_detected,
            confidence_percent: state.confidence_percent,
            timestamp: self.clock.now(),
            recorded_at: self.clock.wall(),
        });
        if history_appended {
            debug!("History entry: detected={}, confidence={}%", state.is_detected, state.confidence_percent);
        }

        self.state = state.clone();
        DetectionUpdate {
            state,
            history_appended,
        }
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn history(&self) -> &DetectionHistory {
        &self.history
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Reset state and history (on driver change)
    pub fn reset(&mut self) {
        self.state = DetectionState::default();
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clock::ManualClock;
    use frame_classifier::BoundingBox;

    const VGA: FrameSize = FrameSize {
        width: 640,
        height: 480,
    };

    fn det(label: &str, score: f64, y: f64) -> Detection {
        Detection {
            bbox: BoundingBox::new(100.0, y, 120.0, 200.0),
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn test_phone_in_hand_high_alert() {
        let clock = Arc::new(ManualClock::new());
        let mut machine = DetectionMachine::new(DetectionConfig::default(), clock);

        let update = machine.apply(&[det("cell phone", 0.92, 300.0)], VGA);

        assert!(update.state.is_detected);
        assert_eq!(update.state.confidence_percent, 92);
        assert_eq!(update.state.alert_level, AlertLevel::High);
        assert!(update.state.in_use);
        assert_eq!(update.state.position, Some(BoundingBox::new(100.0, 300.0, 120.0, 200.0)));
        assert!(update.history_appended);
    }

    #[test]
    fn test_medium_alert_and_upper_half() {
        let state = evaluate(&DetectionConfig::default(), &[det("cell phone", 0.8, 0.0)], VGA);
        assert_eq!(state.alert_level, AlertLevel::Medium);
        assert_eq!(state.confidence_percent, 80);
        // center y = 100 < 240
        assert!(!state.in_use);
    }

    #[test]
    fn test_ignores_other_classes_and_low_scores() {
        let state = evaluate(
            &DetectionConfig::default(),
            &[det("person", 0.99, 300.0), det("cell phone", 0.50, 300.0)],
            VGA,
        );
        assert_eq!(state, DetectionState::default());
    }

    #[test]
    fn test_highest_score_wins() {
        let detections = [det("cell phone", 0.6, 0.0), det("cell phone", 0.85, 300.0), det("cell phone", 0.7, 10.0)];
        let state = evaluate(&DetectionConfig::default(), &detections, VGA);
        assert_eq!(state.confidence_percent, 85);
        assert_eq!(state.position.unwrap().y, 300.0);
        assert!(state.in_use);
    }

    #[test]
    fn test_history_dedup_over_time() {
        let clock = Arc::new(ManualClock::new());
        let mut machine = DetectionMachine::new(DetectionConfig::default(), clock.clone());

        assert!(machine.apply(&[], VGA).history_appended);
        clock.advance(Duration::from_millis(500));
        assert!(!machine.apply(&[], VGA).history_appended);
        clock.advance(Duration::from_millis(500));
        assert!(machine.apply(&[det("cell phone", 0.75, 300.0)], VGA).history_appended);
        clock.advance(Duration::from_millis(3001));
        assert!(machine.apply(&[det("cell phone", 0.75, 300.0)], VGA).history_appended);

        let flags: Vec<bool> = machine.history().iter().map(|e| e.detected).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_clearing_detection_resets_position() {
        let clock = Arc::new(ManualClock::new());
        let mut machine = DetectionMachine::new(DetectionConfig::default(), clock);

        machine.apply(&[det("cell phone", 0.9, 300.0)], VGA);
        let update = machine.apply(&[], VGA);

        assert!(!update.state.is_detected);
        assert_eq!(update.state.confidence_percent, 0);
        assert_eq!(update.state.alert_level, AlertLevel::None);
        assert!(update.state.position.is_none());
        assert!(!update.state.in_use);
    }
}
