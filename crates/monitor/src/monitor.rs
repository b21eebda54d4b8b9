//! Pipeline orchestration

use crate::sampler::FrameSampler;
use crate::settings::MonitorConfig;
use crate::sink::NotificationSink;
use crate::MonitorError;
use alerting::{EscalationOutcome, EscalationState, EscalationTracker};
use camera_capture::VideoSource;
use clock::{Clock, SystemClock};
use dms::{DetectionMachine, DetectionState, HistoryEntry};
use emergency::{EmergencyActions, EmergencyProtocol, ProtocolSnapshot, SimulatedActions};
use frame_classifier::{ClassifierClient, FrameClassifier, HttpClassifier};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Point-in-time view of the whole pipeline
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub monitoring: bool,
    pub classifier_offline: bool,
    pub classifier_degraded: bool,
    pub detection: DetectionState,
    pub history: Vec<HistoryEntry>,
    pub escalation: EscalationState,
    pub protocol: ProtocolSnapshot,
}

/// Wires sampler, detection machine, escalation tracker and emergency
/// protocol together and reports everything to one sink.
pub struct DriverMonitor {
    sampler: FrameSampler,
    machine: Arc<Mutex<DetectionMachine>>,
    classifier: Arc<ClassifierClient>,
    tracker: Arc<EscalationTracker>,
    protocol: Arc<EmergencyProtocol>,
    sink: Arc<dyn NotificationSink>,
    forwarder: Option<JoinHandle<()>>,
}

impl DriverMonitor {
    /// Build with explicit collaborators. Must be called inside a tokio runtime
    /// for protocol updates to reach the sink.
    pub fn new(
        config: &MonitorConfig,
        source: Arc<dyn VideoSource>,
        remote: Arc<dyn FrameClassifier>,
        actions: Arc<dyn EmergencyActions>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let classifier = Arc::new(ClassifierClient::new(remote, &config.classifier));
        let machine = Arc::new(Mutex::new(DetectionMachine::new(config.detection.clone(), clock.clone())));
        let tracker = Arc::new(EscalationTracker::new(config.escalation.clone(), clock.clone()));
        let protocol = Arc::new(EmergencyProtocol::new(config.protocol.clone(), actions));

        let sampler = FrameSampler::new(
            config.sampler.clone(),
            source,
            classifier.clone(),
            machine.clone(),
            sink.clone(),
            clock,
        );

        let emergency = protocol.clone();
        tracker.set_emergency_handler(Arc::new(move |state: EscalationState| {
            warn!("Drowsiness detected {} times, starting emergency protocol", state.count);
            if let Err(e) = emergency.start(true) {
                error!("Could not start emergency protocol: {}", e);
            }
        }));

        let forwarder = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(forward_protocol(protocol.subscribe(), sink.clone()))),
            Err(_) => {
                warn!("No runtime, emergency protocol updates will not reach the sink");
                None
            }
        };

        Self {
            sampler,
            machine,
            classifier,
            tracker,
            protocol,
            sink,
            forwarder,
        }
    }

    /// Build the production pipeline described by `config`
    pub fn from_config(config: &MonitorConfig, sink: Arc<dyn NotificationSink>) -> Result<Self, MonitorError> {
        config.validate()?;
        let remote = Arc::new(HttpClassifier::new(&config.classifier)?);
        let actions = Arc::new(SimulatedActions::new(&config.protocol));
        Ok(Self::new(
            config,
            config.camera.build_source(),
            remote,
            actions,
            sink,
            Arc::new(SystemClock),
        ))
    }

    pub async fn start_monitoring(&self) -> Result<(), MonitorError> {
        self.sampler.start().await
    }

    pub async fn stop_monitoring(&self) -> bool {
        self.sampler.stop().await
    }

    pub async fn is_monitoring(&self) -> bool {
        self.sampler.is_running().await
    }

    /// Record a drowsiness event; may start the emergency protocol
    pub fn report_drowsiness(&self) -> EscalationOutcome {
        let outcome = self.tracker.trigger_event();
        self.sink.escalation_changed(&outcome.state);
        outcome
    }

    pub fn acknowledge_drowsiness(&self) -> EscalationState {
        let state = self.tracker.acknowledge();
        self.sink.escalation_changed(&state);
        state
    }

    pub fn reset_drowsiness(&self) -> EscalationState {
        let state = self.tracker.reset();
        self.sink.escalation_changed(&state);
        state
    }

    /// Manual SOS
    pub fn activate_sos(&self) -> Result<Uuid, MonitorError> {
        Ok(self.protocol.start(false)?)
    }

    pub fn cancel_sos(&self) -> ProtocolSnapshot {
        self.protocol.cancel()
    }

    pub fn detection_state(&self) -> DetectionState {
        self.machine.lock().unwrap_or_else(|e| e.into_inner()).state().clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.machine.lock().unwrap_or_else(|e| e.into_inner()).history().to_vec()
    }

    pub fn escalation(&self) -> EscalationState {
        self.tracker.state()
    }

    pub fn protocol_snapshot(&self) -> ProtocolSnapshot {
        self.protocol.snapshot()
    }

    pub async fn status(&self) -> MonitorStatus {
        let (detection, history) = {
            let machine = self.machine.lock().unwrap_or_else(|e| e.into_inner());
            (machine.state().clone(), machine.history().to_vec())
        };
        MonitorStatus {
            monitoring: self.is_monitoring().await,
            classifier_offline: self.classifier.is_offline(),
            classifier_degraded: self.classifier.is_degraded(),
            detection,
            history,
            escalation: self.tracker.state(),
            protocol: self.protocol.snapshot(),
        }
    }

    /// Stop sampling and release the camera
    pub async fn shutdown(&self) {
        info!("Shutting down driver monitor");
        self.sampler.stop().await;
        self.tracker.clear_emergency_handler();
    }
}

impl Drop for DriverMonitor {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

async fn forward_protocol(mut events: broadcast::Receiver<ProtocolSnapshot>, sink: Arc<dyn NotificationSink>) {
    loop {
        match events.recv().await {
            Ok(snapshot) => sink.protocol_changed(&snapshot),
            Err(RecvError::Lagged(skipped)) => warn!("Sink missed {} emergency protocol updates", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
