//! Controllable clocks
//!
//! [`ManualClock`] only moves when told to. [`TokioClock`] follows the tokio
//! clock, so tests running with paused time drive expirations by sleeping
//! or calling `tokio::time::advance`.

use chrono::{DateTime, Utc};
use keyward_core::Clock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("timestamp in range")
}

fn chrono_delta(by: Duration) -> chrono::Duration {
    chrono::Duration::from_std(by).expect("duration in range")
}

/// Clock that only advances explicitly
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock reading `unix_secs`
    pub fn new(unix_secs: i64) -> Self {
        Self {
            current: Arc::new(Mutex::new(from_unix(unix_secs))),
        }
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += chrono_delta(by);
    }

    /// Move forward by `secs` seconds
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Set absolute time
    pub fn set(&self, unix_secs: i64) {
        *self.current.lock() = from_unix(unix_secs);
    }

    /// Handle sharing this clock's time
    pub fn shared(&self) -> Arc<dyn Clock> {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

/// Wall clock anchored at `origin` that advances with the tokio clock.
///
/// Must be created inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: DateTime<Utc>,
    base: tokio::time::Instant,
}

impl TokioClock {
    /// Anchor wall time `origin_unix_secs` at the current tokio instant
    pub fn new(origin_unix_secs: i64) -> Self {
        Self {
            origin: from_unix(origin_unix_secs),
            base: tokio::time::Instant::now(),
        }
    }

    /// Handle sharing this clock's time
    pub fn shared(&self) -> Arc<dyn Clock> {
        Arc::new(self.clone())
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.origin + chrono_delta(self.base.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_on_request() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.unix_now(), 1_000);
        clock.advance_secs(30);
        assert_eq!(clock.unix_now(), 1_030);
        clock.set(5);
        assert_eq!(clock.unix_now(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::new(1_000);
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.unix_now(), 1_090);
    }
}
