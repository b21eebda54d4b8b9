//! Frame sampling loop
//!
//! Ticks at a fixed rate, and at most once per `min_sample_gap_ms` captures
//! a frame, encodes it and hands it to the classifier. Only one
//! classification is ever outstanding, including across stop/start cycles,
//! and a result that lands after `stop()` is dropped.

use crate::settings::SamplerConfig;
use crate::sink::{DetectionReport, NotificationSink};
use crate::MonitorError;
use camera_capture::{EncodedFrame, VideoSource};
use clock::Clock;
use dms::{AlertLevel, DetectionMachine, FrameSize};
use frame_classifier::{ClassificationOutcome, ClassifierClient};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Admission control for classification requests
#[derive(Debug, Default)]
struct SampleGate {
    in_flight: AtomicBool,
    last_start: Mutex<Option<Instant>>,
}

/// Clears the in-flight flag on drop
struct InFlightGuard {
    gate: Arc<SampleGate>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gate.in_flight.store(false, Ordering::SeqCst);
    }
}

impl SampleGate {
    fn try_begin(self: &Arc<Self>, now: Instant, min_gap: Duration) -> Option<InFlightGuard> {
        let mut last_start = self.last_start.lock().unwrap_or_else(|e| e.into_inner());
        if self.in_flight.load(Ordering::SeqCst) {
            return None;
        }
        if let Some(prev) = *last_start {
            if now.saturating_duration_since(prev) < min_gap {
                return None;
            }
        }
        self.in_flight.store(true, Ordering::SeqCst);
        *last_start = Some(now);
        Some(InFlightGuard { gate: self.clone() })
    }

    fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

struct Shared {
    config: SamplerConfig,
    source: Arc<dyn VideoSource>,
    classifier: Arc<ClassifierClient>,
    machine: Arc<Mutex<DetectionMachine>>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    gate: Arc<SampleGate>,
    /// Bumped on every start/stop; results from an older epoch are dropped
    epoch: AtomicU64,
}

struct RunHandle {
    epoch: u64,
    task: JoinHandle<()>,
}

/// Periodic frame sampler
pub struct FrameSampler {
    shared: Arc<Shared>,
    run: tokio::sync::Mutex<Option<RunHandle>>,
}

impl FrameSampler {
    pub fn new(
        config: SamplerConfig,
        source: Arc<dyn VideoSource>,
        classifier: Arc<ClassifierClient>,
        machine: Arc<Mutex<DetectionMachine>>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            "Creating frame sampler: tick={}ms, gap={}ms, target={}x{} q{}",
            config.tick_interval_ms,
            config.min_sample_gap_ms,
            config.target_width,
            config.target_height,
            config.jpeg_quality
        );
        Self {
            shared: Arc::new(Shared {
                config,
                source,
                classifier,
                machine,
                sink,
                clock,
                gate: Arc::new(SampleGate::default()),
                epoch: AtomicU64::new(0),
            }),
            run: tokio::sync::Mutex::new(None),
        }
    }

    /// Probe the classifier, acquire the video source and begin ticking.
    /// Does nothing if already running.
    pub async fn start(&self) -> Result<(), MonitorError> {
        let mut run = self.run.lock().await;
        if run.is_some() {
            debug!("Sampler already running");
            return Ok(());
        }

        if !self.shared.classifier.health_check().await {
            warn!("Classifier offline, frames will be classified by the local fallback");
        }

        if let Err(e) = self.shared.source.acquire().await {
            self.shared.source.release();
            let err = MonitorError::VideoSourceUnavailable(e);
            error!("Failed to start monitoring: {}", err);
            self.shared.sink.pipeline_error(&err.to_string());
            return Err(err);
        }

        let epoch = {
            let _machine = self.shared.machine.lock().unwrap_or_else(|e| e.into_inner());
            self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };
        let task = tokio::spawn(run_loop(self.shared.clone(), epoch));
        *run = Some(RunHandle { epoch, task });

        info!("Monitoring started (run {})", epoch);
        Ok(())
    }

    /// Stop ticking and release the video source. Returns false if not running.
    pub async fn stop(&self) -> bool {
        let mut run = self.run.lock().await;
        let Some(handle) = run.take() else {
            debug!("Sampler already stopped");
            return false;
        };

        {
            // Serialized with result application so nothing from this run lands afterwards
            let _machine = self.shared.machine.lock().unwrap_or_else(|e| e.into_inner());
            self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        }
        handle.task.abort();
        self.shared.source.release();

        info!("Monitoring stopped (run {})", handle.epoch);
        true
    }

    pub async fn is_running(&self) -> bool {
        self.run.lock().await.is_some()
    }

    /// A classification request is outstanding
    pub fn is_in_flight(&self) -> bool {
        self.shared.gate.is_in_flight()
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        let Some(handle) = self.run.get_mut().take() else {
            return;
        };
        {
            let _machine = self.shared.machine.lock().unwrap_or_else(|e| e.into_inner());
            self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        }
        handle.task.abort();
        self.shared.source.release();
        info!("Sampler dropped, monitoring stopped (run {})", handle.epoch);
    }
}

async fn run_loop(shared: Arc<Shared>, epoch: u64) {
    let mut ticker = tokio::time::interval(Duration::from_millis(shared.config.tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let min_gap = Duration::from_millis(shared.config.min_sample_gap_ms);

    loop {
        ticker.tick().await;
        match shared.gate.try_begin(shared.clock.now(), min_gap) {
            Some(guard) => {
                metrics::counter!("monitor_samples_total").increment(1);
                tokio::spawn(sample(shared.clone(), epoch, guard));
            }
            None => metrics::counter!("monitor_ticks_skipped_total").increment(1),
        }
    }
}

/// One capture-classify-apply cycle. Errors are logged; the loop keeps going.
async fn sample(shared: Arc<Shared>, epoch: u64, _guard: InFlightGuard) {
    let frame = match shared.source.capture().await {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Frame capture failed: {}", e);
            return;
        }
    };

    let (width, height, quality) = (
        shared.config.target_width,
        shared.config.target_height,
        shared.config.jpeg_quality,
    );
    let encoded: EncodedFrame =
        match tokio::task::spawn_blocking(move || frame.encode_for_classifier(width, height, quality)).await {
            Ok(Ok(encoded)) => encoded,
            Ok(Err(e)) => {
                warn!("Frame encoding failed: {}", e);
                return;
            }
            Err(e) => {
                warn!("Frame encoding task failed: {}", e);
                return;
            }
        };

    let outcome = shared.classifier.classify(&encoded).await;
    let Some(detections) = outcome.detections() else {
        if let ClassificationOutcome::Failed(cause) = &outcome {
            debug!("No classification this tick: {}", cause);
        }
        return;
    };

    // Notify under the machine lock so nothing reaches the sink once stop() returns
    let mut machine = shared.machine.lock().unwrap_or_else(|e| e.into_inner());
    if shared.epoch.load(Ordering::SeqCst) != epoch {
        debug!("Discarding result for frame {} from stopped run {}", encoded.sequence, epoch);
        return;
    }
    let update = machine.apply(
        detections,
        FrameSize {
            width: encoded.width,
            height: encoded.height,
        },
    );
    let report = DetectionReport {
        state: update.state,
        history: machine.history().to_vec(),
        history_appended: update.history_appended,
        degraded: outcome.is_degraded(),
        frame_sequence: encoded.sequence,
    };

    let level = match report.state.alert_level {
        AlertLevel::None => 0.0,
        AlertLevel::Medium => 1.0,
        AlertLevel::High => 2.0,
    };
    metrics::gauge!("monitor_alert_level").set(level);

    shared.sink.detection_updated(&report);
}
