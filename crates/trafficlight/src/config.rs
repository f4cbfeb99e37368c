use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Connections that have seen no traffic for this long are considered dead.
pub const DEFAULT_STALE_THRESHOLD_MS: u64 = 15_000;

/// Period of the reconnection check.
pub const DEFAULT_TICK_PERIOD_MS: u64 = 1_000;

/// Particle cloud server-sent events endpoint for the user's devices.
pub const DEFAULT_PUSH_ENDPOINT: &str = "https://api.particle.io/v1/devices/events";

/// Event name published by the firmware whenever the light changes.
pub const DEFAULT_STATUS_EVENT: &str = "status_changed";

/// Particle cloud REST API root.
pub const DEFAULT_API_BASE: &str = "https://api.particle.io";

/// Cloud variable exposing the current light status.
pub const DEFAULT_STATUS_VARIABLE: &str = "status";

pub const DEFAULT_USER_AGENT: &str = concat!("trafficlight/", env!("CARGO_PKG_VERSION"));

/// Tunables for the status stream and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Staleness threshold in milliseconds
    pub stale_threshold_ms: u64,
    /// Reconnection tick period in milliseconds
    pub tick_period_ms: u64,
    /// Push endpoint the stream subscribes to
    pub push_endpoint: String,
    /// Event name forwarded to the display as a status change
    pub status_event: String,
    /// REST API root used for resync and status commands
    pub api_base: String,
    /// Cloud variable read during resync
    pub status_variable: String,
    pub user_agent: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stale_threshold_ms: DEFAULT_STALE_THRESHOLD_MS,
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            push_endpoint: DEFAULT_PUSH_ENDPOINT.to_owned(),
            status_event: DEFAULT_STATUS_EVENT.to_owned(),
            api_base: DEFAULT_API_BASE.to_owned(),
            status_variable: DEFAULT_STATUS_VARIABLE.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl StreamConfig {
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_millis(self.stale_threshold_ms)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold_ms = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_push_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.push_endpoint = endpoint.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tick_period_ms == 0 {
            return Err(Error::config("tick_period_ms must be greater than zero"));
        }
        if self.stale_threshold_ms == 0 {
            return Err(Error::config("stale_threshold_ms must be greater than zero"));
        }
        if self.status_event.trim().is_empty() {
            return Err(Error::config("status_event must not be empty"));
        }
        for (name, value) in [
            ("push_endpoint", &self.push_endpoint),
            ("api_base", &self.api_base),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::config(format!("invalid {name} `{value}`: {e}")))?;
        }
        Ok(())
    }
}
