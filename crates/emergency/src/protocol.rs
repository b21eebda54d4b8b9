//! Emergency protocol runner

use crate::actions::EmergencyActions;
use crate::ProtocolConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EVENT_BUFFER_SIZE: usize = 64;

const LEAD_IN_DELAY: Duration = Duration::from_millis(1000);
const LOCATE_DELAY: Duration = Duration::from_millis(1000);
const SERVICES_DELAY: Duration = Duration::from_millis(1500);
const FIRST_CONTACT_DELAY: Duration = Duration::from_millis(1000);
const REMAINING_CONTACTS_DELAY: Duration = Duration::from_millis(500);
const COMPLETE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("no async runtime available to run the protocol")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolState {
    #[default]
    Idle,
    Running,
    Completed,
}

impl ProtocolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolState::Idle => "idle",
            ProtocolState::Running => "running",
            ProtocolState::Completed => "completed",
        }
    }
}

/// Observable protocol state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProtocolSnapshot {
    pub run_id: Option<Uuid>,
    pub state: ProtocolState,
    /// 0..=100
    pub progress: u8,
    pub status_log: Vec<String>,
    pub auto_triggered: bool,
}

struct Inner {
    config: ProtocolConfig,
    actions: Arc<dyn EmergencyActions>,
    /// Bumped by every start/cancel; a stage only applies if its run is current
    generation: AtomicU64,
    snapshot: Mutex<ProtocolSnapshot>,
    events: broadcast::Sender<ProtocolSnapshot>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Mutate the snapshot if `generation` is still current.
    /// Returns false when the run has been superseded or cancelled.
    fn update(&self, generation: u64, f: impl FnOnce(&mut ProtocolSnapshot)) -> bool {
        let published = {
            let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            f(&mut snapshot);
            snapshot.clone()
        };
        // No receivers is fine
        let _ = self.events.send(published);
        true
    }

    fn log(&self, generation: u64, line: impl Into<String>) -> bool {
        let line = line.into();
        self.update(generation, |s| {
            debug!("Emergency: {}", line);
            s.status_log.push(line);
        })
    }

    fn progress(&self, generation: u64, progress: u8) -> bool {
        self.update(generation, |s| s.progress = progress)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Runs the staged emergency workflow.
///
/// `start` spawns the run as a task; starting again while a run is in
/// progress restarts it. `cancel` returns to idle and clears the log.
pub struct EmergencyProtocol {
    inner: Arc<Inner>,
}

impl EmergencyProtocol {
    pub fn new(config: ProtocolConfig, actions: Arc<dyn EmergencyActions>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            inner: Arc::new(Inner {
                config,
                actions,
                generation: AtomicU64::new(0),
                snapshot: Mutex::new(ProtocolSnapshot::default()),
                events,
                task: Mutex::new(None),
            }),
        }
    }

    /// Reset progress and log, mark running, return the new generation
    fn begin(&self, auto_triggered: bool) -> (u64, Uuid) {
        let run_id = Uuid::new_v4();
        let (generation, snapshot) = {
            let mut snapshot = self.inner.snapshot.lock().unwrap_or_else(|e| e.into_inner());
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            if snapshot.state == ProtocolState::Running {
                warn!("Emergency protocol restarted while running");
            }
            *snapshot = ProtocolSnapshot {
                run_id: Some(run_id),
                state: ProtocolState::Running,
                progress: 0,
                status_log: Vec::new(),
                auto_triggered,
            };
            (generation, snapshot.clone())
        };
        let _ = self.inner.events.send(snapshot);

        metrics::counter!(
            "emergency_runs_total",
            "trigger" => if auto_triggered { "auto" } else { "manual" }
        )
        .increment(1);
        info!("Emergency protocol started (run {}, auto: {})", run_id, auto_triggered);

        (generation, run_id)
    }

    /// Start the protocol in the background
    pub fn start(&self, auto_triggered: bool) -> Result<Uuid, ProtocolError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| ProtocolError::NoRuntime)?;
        let (generation, run_id) = self.begin(auto_triggered);

        let inner = self.inner.clone();
        let task = handle.spawn(async move {
            run_stages(&inner, generation, auto_triggered).await;
        });

        let previous = self.inner.task.lock().unwrap_or_else(|e| e.into_inner()).replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(run_id)
    }

    /// Run the protocol to completion on the current task
    pub async fn run(&self, auto_triggered: bool) -> ProtocolSnapshot {
        let (generation, _) = self.begin(auto_triggered);
        if let Some(previous) = self.inner.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            previous.abort();
        }
        run_stages(&self.inner, generation, auto_triggered).await;
        self.snapshot()
    }

    /// Abort any run and return to idle
    pub fn cancel(&self) -> ProtocolSnapshot {
        let cleared = {
            let mut snapshot = self.inner.snapshot.lock().unwrap_or_else(|e| e.into_inner());
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            *snapshot = ProtocolSnapshot::default();
            snapshot.clone()
        };
        if let Some(task) = self.inner.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
        let _ = self.inner.events.send(cleared.clone());
        info!("Emergency protocol cancelled");
        cleared
    }

    pub fn snapshot(&self) -> ProtocolSnapshot {
        self.inner.snapshot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Receive every snapshot change
    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolSnapshot> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.inner.config
    }
}

impl Drop for EmergencyProtocol {
    fn drop(&mut self) {
        if let Some(task) = self.inner.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
    }
}

/// The staged sequence. Every step bails out once the run is no longer current.
async fn run_stages(inner: &Inner, generation: u64, auto_triggered: bool) {
    let actions = inner.actions.clone();

    if auto_triggered {
        if !inner.log(generation, "Automatically triggered due to repeated drowsiness detection") {
            return;
        }
        tokio::time::sleep(LEAD_IN_DELAY).await;
    }

    // Location
    if !inner.log(generation, "Getting current location...") {
        return;
    }
    let (location, _) = tokio::join!(actions.locate(), tokio::time::sleep(LOCATE_DELAY));
    if !inner.progress(generation, 20) {
        return;
    }
    let location = match location {
        Ok(location) => {
            inner.log(generation, format!("Location acquired: {}", location));
            Some(location)
        }
        Err(e) => {
            warn!("Emergency locate failed: {}", e);
            inner.log(generation, format!("Location unavailable: {}", e));
            None
        }
    };

    // Emergency services
    if !inner.log(generation, "Contacting emergency services...") {
        return;
    }
    let (dispatch, _) = tokio::join!(
        actions.notify_services(location.as_deref()),
        tokio::time::sleep(SERVICES_DELAY)
    );
    if !inner.progress(generation, 40) {
        return;
    }
    match dispatch {
        Ok(eta) => {
            inner.log(generation, "Emergency services notified");
            inner.log(generation, format!("Police dispatch estimated arrival: {} minutes", eta));
        }
        Err(e) => {
            warn!("Emergency services notification failed: {}", e);
            inner.log(generation, format!("Failed to contact emergency services: {}", e));
        }
    }

    // Contacts
    if !inner.log(generation, "Notifying emergency contacts...") {
        return;
    }
    let contacts = &inner.config.contacts;
    let (first, rest) = match contacts.split_first() {
        Some((first, rest)) => (Some(first), rest),
        None => (None, &[][..]),
    };

    let first_result = async {
        match first {
            Some(contact) => Some((contact, actions.notify_contact(contact).await)),
            None => None,
        }
    };
    let (first_result, _) = tokio::join!(first_result, tokio::time::sleep(FIRST_CONTACT_DELAY));
    if !inner.progress(generation, 60) {
        return;
    }
    match first_result {
        Some((contact, result)) => log_contact(inner, generation, contact, result),
        None => {
            inner.log(generation, "No emergency contacts configured");
        }
    }

    let rest_results = async {
        let mut results = Vec::with_capacity(rest.len());
        for contact in rest {
            results.push((contact, actions.notify_contact(contact).await));
        }
        results
    };
    let (rest_results, _) = tokio::join!(rest_results, tokio::time::sleep(REMAINING_CONTACTS_DELAY));
    if !inner.progress(generation, 80) {
        return;
    }
    for (contact, result) in rest_results {
        log_contact(inner, generation, contact, result);
    }

    tokio::time::sleep(COMPLETE_DELAY).await;
    if !inner.is_current(generation) {
        return;
    }
    inner.update(generation, |s| {
        s.progress = 100;
        s.status_log.push("Emergency response protocol completed".to_string());
        s.state = ProtocolState::Completed;
    });
    info!("Emergency protocol completed");
}

fn log_contact(inner: &Inner, generation: u64, contact: &str, result: Result<(), crate::ActionError>) {
    match result {
        Ok(()) => {
            inner.log(generation, format!("Alert sent to: {}", contact));
        }
        Err(e) => {
            warn!("Emergency contact notification failed: {}", e);
            inner.log(generation, format!("Failed to alert {}: {}", contact, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedActions;

    fn protocol() -> EmergencyProtocol {
        EmergencyProtocol::new(ProtocolConfig::default(), Arc::new(SimulatedActions::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_run_log() {
        let protocol = protocol();
        let snapshot = protocol.run(false).await;

        assert_eq!(snapshot.state, ProtocolState::Completed);
        assert_eq!(snapshot.progress, 100);
        assert!(!snapshot.auto_triggered);
        assert_eq!(
            snapshot.status_log,
            vec![
                "Getting current location...",
                "Location acquired: Sample Location, City",
                "Contacting emergency services...",
                "Emergency services notified",
                "Police dispatch estimated arrival: 8 minutes",
                "Notifying emergency contacts...",
                "Alert sent to: Family Member 1",
                "Alert sent to: Family Member 2",
                "Emergency response protocol completed",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_follows_stage_delays() {
        let protocol = protocol();
        protocol.start(false).unwrap();

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(protocol.snapshot().progress, 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(protocol.snapshot().progress, 20);
        // 1000 + 1500
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(protocol.snapshot().progress, 40);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(protocol.snapshot().progress, 60);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(protocol.snapshot().progress, 80);
        assert_eq!(protocol.snapshot().state, ProtocolState::Running);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(protocol.snapshot().progress, 100);
        assert_eq!(protocol.snapshot().state, ProtocolState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_from_idle() {
        let protocol = protocol();
        let snapshot = protocol.cancel();
        assert_eq!(snapshot, ProtocolSnapshot::default());
    }

    #[test]
    fn test_start_without_runtime() {
        let protocol = protocol();
        assert_eq!(protocol.start(true), Err(ProtocolError::NoRuntime));
        assert_eq!(protocol.snapshot().state, ProtocolState::Idle);
    }
}
