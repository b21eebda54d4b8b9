//! Time Source
//!
//! Every component that reasons about elapsed time (sampling gate, history
//! de-duplication, escalation window) reads "now" through [`Clock`] so tests
//! can drive time explicitly instead of sleeping.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync {
    /// Monotonic instant used for interval arithmetic
    fn now(&self) -> Instant;

    /// Wall-clock timestamp used for display and serialization
    fn wall(&self) -> DateTime<Utc>;
}

/// Clock backed by the tokio timer.
///
/// Follows `tokio::time::pause()` / `advance()` inside paused test runtimes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    base_wall: DateTime<Utc>,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            base_wall: Utc::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Total time advanced since creation
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(self.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        self.base_wall + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        let start_wall = clock.wall();

        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.now() - start, Duration::from_secs(90));
        assert_eq!((clock.wall() - start_wall).num_seconds(), 90);
    }

    #[test]
    fn test_manual_clock_is_frozen() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), clock.now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_follows_paused_time() {
        let clock = SystemClock;
        let start = clock.now();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(clock.now() - start >= Duration::from_millis(500));
    }
}
