//! Time source used by expiry checks and key lifecycle timestamps.

use chrono::{DateTime, Utc};

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for expiry and rotation tests.
///
/// Clones share one instant, so a test can keep a handle and move time
/// under a validator or key store that owns another clone.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    now: std::sync::Arc<std::sync::RwLock<DateTime<Utc>>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Start the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Arc::new(std::sync::RwLock::new(now)),
        }
    }

    /// Start the clock at a license timestamp (RFC 3339, or naive UTC).
    ///
    /// # Panics
    /// Panics on a malformed timestamp; only meant for test fixtures.
    pub fn from_rfc3339(s: &str) -> Self {
        match crate::protocol::models::parse_timestamp(s) {
            Ok(now) => Self::new(now),
            Err(e) => panic!("MockClock fixture: {}", e),
        }
    }

    /// Move every clone forward (or backward, for a negative duration).
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }

    /// Jump every clone to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|p| p.into_inner()) = at;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|p| p.into_inner())
    }
}
