//! # Traffic Light
//!
//! Keeps a live view of a Particle-hosted status light.
//!
//! The device publishes a `status_changed` event whenever its light changes.
//! This crate subscribes to the Particle push stream, decodes those events and
//! forwards the status to a [`StatusDisplay`]. The stream is allowed to die
//! silently: a [`ReconnectScheduler`] notices when no traffic has arrived for
//! a while, resyncs the display and opens a fresh subscription.
//!
//! ## Features
//!
//! - Chunk decoder for `event:` / `data:` records
//! - Per-connection event bus whose listeners are all dropped on dispose
//! - Traffic-based liveness instead of transport close notifications
//! - Non-reentrant reconnect scheduler that re-reads credentials every tick
//! - Particle REST client for status resync and status commands
//!

pub mod config;
pub mod connection;
pub mod credentials;
pub mod display;
pub mod error;
pub mod event;
pub mod frame;
pub mod liveness;
pub mod particle;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
mod test_utils;

pub use config::StreamConfig;
pub use connection::StreamConnection;
pub use credentials::{CredentialKey, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use display::{ChannelDisplay, StatusCode, StatusDisplay};
pub use error::{Error, Result};
pub use event::{EventBus, EventKind};
pub use frame::Record;
pub use liveness::{ConnectionStatus, LivenessTracker};
pub use particle::{FunctionResponse, ParticleClient, StatusCommand, StatusSource};
pub use scheduler::{ReconnectScheduler, SchedulerHandle, TickOutcome};
pub use transport::{ChunkStream, EventTransport, HttpTransport, Subscription};
