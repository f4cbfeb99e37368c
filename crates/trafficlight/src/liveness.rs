//! Traffic-timing liveness.
//!
//! The push stream carries no heartbeat of its own, so a connection is judged
//! purely by how long ago it last delivered any bytes.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Derived connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Open,
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Records when traffic was last seen and derives [`ConnectionStatus`].
///
/// Construction counts as traffic, which gives a freshly opened connection a
/// grace period of one threshold before it is reported closed.
#[derive(Debug)]
pub struct LivenessTracker {
    last_touch: Mutex<Instant>,
    threshold: Duration,
}

impl LivenessTracker {
    pub fn new(threshold: Duration) -> Self {
        Self::starting_at(Instant::now(), threshold)
    }

    pub fn starting_at(now: Instant, threshold: Duration) -> Self {
        Self {
            last_touch: Mutex::new(now),
            threshold,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Record traffic now.
    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    pub fn touch_at(&self, now: Instant) {
        *self.last_touch.lock() = now;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_at(Instant::now())
    }

    /// `Open` iff less than one threshold elapsed since the last touch.
    pub fn status_at(&self, now: Instant) -> ConnectionStatus {
        if self.elapsed_at(now) < self.threshold {
            ConnectionStatus::Open
        } else {
            ConnectionStatus::Closed
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_touch.lock())
    }
}
