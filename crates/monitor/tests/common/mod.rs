#![allow(dead_code)]

use async_trait::async_trait;
use camera_capture::{EncodedFrame, SyntheticCamera};
use clock::SystemClock;
use emergency::SimulatedActions;
use frame_classifier::{BoundingBox, ClassifierError, Detection, FrameClassifier, HealthStatus};
use monitor::{DriverMonitor, MemorySink, MonitorConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

/// Classifier that records when calls start and how many overlap
pub struct RecordingClassifier {
    delay: Duration,
    detections: Vec<Detection>,
    healthy: bool,
    starts: Mutex<Vec<Instant>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordingClassifier {
    pub fn new(delay: Duration, detections: Vec<Detection>) -> Self {
        Self {
            delay,
            detections,
            healthy: true,
            starts: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameClassifier for RecordingClassifier {
    async fn classify(&self, frame: &EncodedFrame) -> Result<Vec<Detection>, ClassifierError> {
        assert!(frame.data_url.starts_with("data:image/jpeg;base64,"));
        self.starts.lock().unwrap().push(Instant::now());
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        tokio::time::sleep(self.delay).await;
        Ok(self.detections.clone())
    }

    async fn health_check(&self) -> Result<HealthStatus, ClassifierError> {
        if self.healthy {
            Ok(HealthStatus {
                status: "ok".to_string(),
                model_loaded: true,
            })
        } else {
            Err(ClassifierError::Unavailable("connection refused".to_string()))
        }
    }
}

/// Phone held low in a 64x48 frame
pub fn phone(score: f64) -> Detection {
    Detection {
        bbox: BoundingBox::new(10.0, 30.0, 20.0, 10.0),
        label: "cell phone".to_string(),
        score,
    }
}

pub fn test_config() -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.sampler.target_width = WIDTH;
    config.sampler.target_height = HEIGHT;
    config.classifier.fallback_seed = Some(7);
    config
}

pub struct Pipeline {
    pub monitor: DriverMonitor,
    pub camera: Arc<SyntheticCamera>,
    pub classifier: Arc<RecordingClassifier>,
    pub sink: Arc<MemorySink>,
}

pub fn pipeline(classifier: RecordingClassifier, config: MonitorConfig) -> Pipeline {
    let camera = Arc::new(SyntheticCamera::new(WIDTH, HEIGHT));
    let classifier = Arc::new(classifier);
    let sink = Arc::new(MemorySink::new());
    let monitor = DriverMonitor::new(
        &config,
        camera.clone(),
        classifier.clone(),
        Arc::new(SimulatedActions::new(&config.protocol)),
        sink.clone(),
        Arc::new(SystemClock),
    );
    Pipeline {
        monitor,
        camera,
        classifier,
        sink,
    }
}
