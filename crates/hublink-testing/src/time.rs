//! Deterministic clock for time-based tests.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use hublink_core::Clock;

/// Controllable clock for worker and retry tests.
///
/// `sleep` advances virtual time and returns immediately, so poll loops
/// and backoff windows run without real waiting.
#[derive(Debug, Clone)]
pub struct TestClock {
    epoch_millis: Arc<AtomicI64>,
}

impl TestClock {
    /// Creates a test clock starting at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Creates a test clock starting at a specific time.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { epoch_millis: Arc::new(AtomicI64::new(start.timestamp_millis())) }
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.epoch_millis.fetch_add(duration.as_millis() as i64, Ordering::AcqRel);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let millis = self.epoch_millis.load(Ordering::Acquire);
        Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        // Yield once so cancellation branches in select! get polled
        Box::pin(tokio::task::yield_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_time_forward() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let clock = TestClock::starting_at(start);

        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.now_utc(), start + chrono::Duration::seconds(90));
    }

    #[tokio::test]
    async fn sleep_advances_without_waiting() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let clock = TestClock::starting_at(start);

        clock.sleep(Duration::from_secs(3600)).await;

        assert_eq!(clock.now_utc(), start + chrono::Duration::hours(1));
    }
}
