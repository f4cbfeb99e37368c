//! Status codes and the display sink they are pushed to.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Numeric status reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub i64);

impl StatusCode {
    /// Parse the `data` of a status record.
    ///
    /// Accepts a bare integer (`"2"`) or the Particle cloud event envelope,
    /// whose `data` field holds the published value as a string or number
    /// (`{"data":"2","ttl":60,"published_at":"...","coreid":"..."}`).
    pub fn parse(data: &str) -> Option<Self> {
        let data = data.trim();
        if let Ok(code) = data.parse::<i64>() {
            return Some(Self(code));
        }

        let envelope: serde_json::Value = serde_json::from_str(data).ok()?;
        match envelope.get("data")? {
            serde_json::Value::String(inner) => inner.trim().parse().ok().map(Self),
            serde_json::Value::Number(inner) => inner.as_i64().map(Self),
            _ => None,
        }
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where status updates end up.
///
/// `show` is called from the stream reader and the scheduler tick; it must
/// return promptly and never block.
pub trait StatusDisplay: Send + Sync {
    fn show(&self, status: StatusCode);
}

/// Forwards every shown status into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelDisplay {
    tx: mpsc::UnboundedSender<StatusCode>,
}

impl ChannelDisplay {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusCode>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusDisplay for ChannelDisplay {
    fn show(&self, status: StatusCode) {
        // Receiver gone means nobody is watching any more.
        let _ = self.tx.send(status);
    }
}
