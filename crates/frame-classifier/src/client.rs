//! Classifier client with timeout and degraded-mode fallback

use crate::{ClassifierConfig, ClassifierError, Detection, FrameClassifier, SyntheticClassifier};
use camera_capture::EncodedFrame;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Outcome of one classification call
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    /// The remote service answered
    Remote { detections: Vec<Detection> },
    /// The remote call failed; `detections` are synthetic
    Degraded {
        detections: Vec<Detection>,
        cause: ClassifierError,
    },
    /// The remote call failed and fallback is disabled
    Failed(ClassifierError),
}

impl ClassificationOutcome {
    /// Detections to feed into the state machine, if any result exists
    pub fn detections(&self) -> Option<&[Detection]> {
        match self {
            Self::Remote { detections } | Self::Degraded { detections, .. } => Some(detections),
            Self::Failed(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Remote { .. })
    }
}

/// Front door to the classification capability
pub struct ClassifierClient {
    remote: Arc<dyn FrameClassifier>,
    fallback: SyntheticClassifier,
    request_timeout: Duration,
    health_timeout: Duration,
    fallback_enabled: bool,
    offline: AtomicBool,
    degraded: AtomicBool,
    degraded_calls: AtomicU64,
}

impl ClassifierClient {
    /// Wrap `remote` with the timeouts and fallback from `config`
    pub fn new(remote: Arc<dyn FrameClassifier>, config: &ClassifierConfig) -> Self {
        let fallback = match config.fallback_seed {
            Some(seed) => SyntheticClassifier::with_seed(&config.target_class, config.fallback_probability, seed),
            None => SyntheticClassifier::new(&config.target_class, config.fallback_probability),
        };

        info!(
            "Creating classifier client: timeout={}ms, health_timeout={}ms, fallback={}",
            config.request_timeout_ms, config.health_timeout_ms, config.fallback_enabled
        );

        Self {
            remote,
            fallback,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
            fallback_enabled: config.fallback_enabled,
            offline: AtomicBool::new(false),
            degraded: AtomicBool::new(false),
            degraded_calls: AtomicU64::new(0),
        }
    }

    /// Classify one frame. Never returns an error: failures become
    /// `Degraded` (or `Failed` when fallback is disabled).
    pub async fn classify(&self, frame: &EncodedFrame) -> ClassificationOutcome {
        let result = match timeout(self.request_timeout, self.remote.classify(frame)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(self.request_timeout.as_millis() as u64)),
        };

        match result {
            Ok(detections) => {
                if self.degraded.swap(false, Ordering::Relaxed) {
                    info!("Classifier recovered, leaving degraded mode");
                }
                debug!("Frame {}: {} detections", frame.sequence, detections.len());
                ClassificationOutcome::Remote { detections }
            }
            Err(cause) => {
                if !self.degraded.swap(true, Ordering::Relaxed) {
                    warn!("Classifier failed, entering degraded mode: {}", cause);
                } else {
                    debug!("Classifier still failing: {}", cause);
                }
                self.degraded_calls.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("classifier_degraded_total").increment(1);

                if self.fallback_enabled {
                    ClassificationOutcome::Degraded {
                        detections: self.fallback.classify(frame.width, frame.height),
                        cause,
                    }
                } else {
                    ClassificationOutcome::Failed(cause)
                }
            }
        }
    }

    /// Short-timeout liveness probe. Updates the offline flag.
    pub async fn health_check(&self) -> bool {
        let healthy = match timeout(self.health_timeout, self.remote.health_check()).await {
            Ok(Ok(status)) => {
                info!("Classifier health: status={}, model_loaded={}", status.status, status.model_loaded);
                status.is_ok()
            }
            Ok(Err(e)) => {
                warn!("Classifier health probe failed: {}", e);
                false
            }
            Err(_) => {
                warn!("Classifier health probe timed out after {}ms", self.health_timeout.as_millis());
                false
            }
        };

        self.offline.store(!healthy, Ordering::Relaxed);
        healthy
    }

    /// Set after a failed health probe
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Relaxed)
    }

    /// Whether the most recent call fell back
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Number of calls that fell back
    pub fn degraded_calls(&self) -> u64 {
        self.degraded_calls.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundingBox, HealthStatus};
    use async_trait::async_trait;

    struct FixedClassifier {
        result: Result<Vec<Detection>, ClassifierError>,
        delay: Duration,
    }

    #[async_trait]
    impl FrameClassifier for FixedClassifier {
        async fn classify(&self, _frame: &EncodedFrame) -> Result<Vec<Detection>, ClassifierError> {
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }

        async fn health_check(&self) -> Result<HealthStatus, ClassifierError> {
            tokio::time::sleep(self.delay).await;
            self.result.clone().map(|_| HealthStatus {
                status: "ok".into(),
                model_loaded: true,
            })
        }
    }

    fn frame() -> EncodedFrame {
        EncodedFrame {
            data_url: "data:image/jpeg;base64,".into(),
            width: 640,
            height: 480,
            sequence: 1,
        }
    }

    fn phone(score: f64) -> Detection {
        Detection {
            bbox: BoundingBox::new(100.0, 300.0, 120.0, 200.0),
            label: "cell phone".into(),
            score,
        }
    }

    fn config() -> ClassifierConfig {
        ClassifierConfig {
            fallback_seed: Some(3),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_result_is_verbatim() {
        let remote = Arc::new(FixedClassifier {
            result: Ok(vec![phone(0.92)]),
            delay: Duration::from_millis(100),
        });
        let client = ClassifierClient::new(remote, &config());

        let outcome = client.classify(&frame()).await;
        assert_eq!(outcome, ClassificationOutcome::Remote { detections: vec![phone(0.92)] });
        assert!(!client.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let remote = Arc::new(FixedClassifier {
            result: Ok(vec![phone(0.92)]),
            delay: Duration::from_secs(6),
        });
        let client = ClassifierClient::new(remote, &config());

        let outcome = client.classify(&frame()).await;
        match outcome {
            ClassificationOutcome::Degraded { cause, .. } => assert_eq!(cause, ClassifierError::Timeout(5000)),
            other => panic!("expected degraded, got {:?}", other),
        }
        assert!(client.is_degraded());
        assert_eq!(client.degraded_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_fallback() {
        let remote = Arc::new(FixedClassifier {
            result: Err(ClassifierError::Unavailable("connection refused".into())),
            delay: Duration::ZERO,
        });
        let client = ClassifierClient::new(
            remote,
            &ClassifierConfig {
                fallback_enabled: false,
                ..config()
            },
        );

        let outcome = client.classify(&frame()).await;
        assert!(matches!(outcome, ClassificationOutcome::Failed(ClassifierError::Unavailable(_))));
        assert!(outcome.detections().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_error_is_degraded() {
        let failing = ClassifierClient::new(
            Arc::new(FixedClassifier {
                result: Err(ClassifierError::Remote("Model not loaded".into())),
                delay: Duration::ZERO,
            }),
            &config(),
        );
        assert!(failing.classify(&frame()).await.is_degraded());
        assert!(failing.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_timeout_marks_offline() {
        let remote = Arc::new(FixedClassifier {
            result: Ok(vec![]),
            delay: Duration::from_secs(3),
        });
        let client = ClassifierClient::new(remote, &config());

        assert!(!client.health_check().await);
        assert!(client.is_offline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_ok() {
        let remote = Arc::new(FixedClassifier {
            result: Ok(vec![]),
            delay: Duration::from_millis(10),
        });
        let client = ClassifierClient::new(remote, &config());

        assert!(client.health_check().await);
        assert!(!client.is_offline());
    }
}
