//! Synthetic degraded-mode classifier
//!
//! Produces plausible phone detections so the pipeline keeps running while
//! the remote service is down. Results from here are never real detections.

use crate::{BoundingBox, Detection};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Local random stand-in for the remote classifier
pub struct SyntheticClassifier {
    target_class: String,
    probability: f64,
    rng: Mutex<StdRng>,
}

impl SyntheticClassifier {
    /// Create with an entropy-seeded RNG
    pub fn new(target_class: &str, probability: f64) -> Self {
        Self::from_rng(target_class, probability, StdRng::from_entropy())
    }

    /// Create with a fixed seed (deterministic output)
    pub fn with_seed(target_class: &str, probability: f64, seed: u64) -> Self {
        Self::from_rng(target_class, probability, StdRng::seed_from_u64(seed))
    }

    fn from_rng(target_class: &str, probability: f64, rng: StdRng) -> Self {
        Self {
            target_class: target_class.to_string(),
            probability: probability.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }

    /// Zero or one detection for a `width`x`height` frame
    pub fn classify(&self, width: u32, height: u32) -> Vec<Detection> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

        if rng.gen::<f64>() <= 1.0 - self.probability {
            return Vec::new();
        }

        let (w, h) = (width as f64, height as f64);
        let box_width = 100.0 + rng.gen::<f64>() * 100.0;
        let box_height = 150.0 + rng.gen::<f64>() * 100.0;

        // Hands (and phones) sit in the lower half of a cabin frame
        let x = (rng.gen::<f64>() * w - box_width).max(0.0);
        let y = (h / 2.0 + rng.gen::<f64>() * (h / 2.0) - box_height).max(0.0);

        vec![Detection {
            bbox: BoundingBox::new(x, y, box_width, box_height),
            label: self.target_class.clone(),
            score: 0.7 + rng.gen::<f64>() * 0.29,
        }]
    }
}
