//! Per-item progress throttling.
//!
//! A worker offers its byte count after every chunk; only some offers turn
//! into `Progress` events. The first offer of an attempt and the final count
//! always go out, a count that was already reported never does.

use std::time::Duration;

use tokio::time::Instant;

/// Decides which byte counts of one transfer are reported.
#[derive(Debug)]
pub struct ProgressThrottle {
    min_interval: Duration,
    last_emit: Option<Instant>,
    last_bytes: Option<u64>,
}

impl ProgressThrottle {
    /// Throttle allowing at most one report per `min_interval`.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
            last_bytes: None,
        }
    }

    /// Whether `bytes` should be reported now.
    pub fn admit(&mut self, bytes: u64) -> bool {
        if self.last_bytes == Some(bytes) {
            return false;
        }
        let now = Instant::now();
        if self
            .last_emit
            .is_some_and(|last| now.duration_since(last) < self.min_interval)
        {
            return false;
        }
        self.record(now, bytes);
        true
    }

    /// Whether the final count of a transfer still needs reporting.
    ///
    /// Ignores the interval.
    pub fn admit_final(&mut self, bytes: u64) -> bool {
        if self.last_bytes == Some(bytes) {
            return false;
        }
        self.record(Instant::now(), bytes);
        true
    }

    /// Let the next offer through regardless of the interval (after a resume).
    pub const fn rearm(&mut self) {
        self.last_emit = None;
    }

    const fn record(&mut self, at: Instant, bytes: u64) {
        self.last_emit = Some(at);
        self.last_bytes = Some(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_interval_limits_reports() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(50));
        assert!(throttle.admit(64));
        assert!(!throttle.admit(128));

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(throttle.admit(192));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_count_is_never_reported_twice() {
        let mut throttle = ProgressThrottle::new(Duration::ZERO);
        assert!(throttle.admit(100));
        assert!(!throttle.admit(100));
        assert!(!throttle.admit_final(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_count_skips_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(3));
        assert!(throttle.admit(10));
        assert!(!throttle.admit(20));
        assert!(throttle.admit_final(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_after_resume() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(3));
        assert!(throttle.admit(10));
        assert!(!throttle.admit(20));

        throttle.rearm();
        assert!(throttle.admit(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_transfer_reports_zero_once() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(3));
        assert!(throttle.admit_final(0));
        assert!(!throttle.admit_final(0));
    }
}
