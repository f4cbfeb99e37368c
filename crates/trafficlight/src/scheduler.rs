//! Periodic liveness check and resubscription.
//!
//! Every tick either confirms the current connection is still receiving
//! traffic, or:
//!
//! 1. resyncs the display from a one-shot status fetch,
//! 2. disposes the stale connection (unregistering its listeners),
//! 3. opens a fresh connection with the token read from the store right now.
//!
//! Ticks are non-reentrant. A tick that starts while another one is still
//! suspended (usually inside the resync fetch) returns
//! [`TickOutcome::InFlight`] without touching anything.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::connection::StreamConnection;
use crate::credentials::{CredentialKey, CredentialStore};
use crate::display::{StatusCode, StatusDisplay};
use crate::event::{EventBus, EventKind};
use crate::liveness::ConnectionStatus;
use crate::particle::StatusSource;
use crate::transport::{EventTransport, Subscription};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The current connection is open; nothing to do.
    Healthy,
    /// Another tick is still running; this one was absorbed.
    InFlight,
    /// No user token; no connection is held until one is set.
    MissingCredentials,
    /// A fresh connection replaced the stale or missing one.
    Reconnected,
}

/// Keeps exactly one live subscription to the push endpoint.
pub struct ReconnectScheduler {
    config: StreamConfig,
    credentials: Arc<dyn CredentialStore>,
    status_source: Arc<dyn StatusSource>,
    display: Arc<dyn StatusDisplay>,
    transport: Arc<dyn EventTransport>,
    current: Mutex<Option<StreamConnection>>,
}

impl ReconnectScheduler {
    pub fn new(
        config: StreamConfig,
        credentials: Arc<dyn CredentialStore>,
        status_source: Arc<dyn StatusSource>,
        display: Arc<dyn StatusDisplay>,
        transport: Arc<dyn EventTransport>,
    ) -> Self {
        Self {
            config,
            credentials,
            status_source,
            display,
            transport,
            current: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Run one reconnection check.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(mut current) = self.current.try_lock() else {
            trace!("Previous tick still running, skipping");
            return TickOutcome::InFlight;
        };

        match current.as_ref() {
            Some(conn) if conn.status() == ConnectionStatus::Open => {
                debug!(
                    connection = conn.id(),
                    idle_ms = conn.liveness().elapsed().as_millis() as u64,
                    "Event stream alive"
                );
                return TickOutcome::Healthy;
            }
            Some(conn) => {
                info!(
                    connection = conn.id(),
                    idle_ms = conn.liveness().elapsed().as_millis() as u64,
                    "Event stream stale, resubscribing"
                );
            }
            None => info!("No event stream, subscribing"),
        }

        self.resync().await;

        let Some(token) = self.read_credential(CredentialKey::UserToken).await else {
            if let Some(stale) = current.take() {
                stale.dispose();
            }
            warn!("No user token set, not subscribing");
            return TickOutcome::MissingCredentials;
        };

        // The superseded connection must be gone before its replacement can
        // deliver anything.
        if let Some(previous) = current.take() {
            previous.dispose();
        }

        let bus = EventBus::new();
        let display = self.display.clone();
        bus.on(EventKind::StatusChanged, move |data| {
            match StatusCode::parse(data) {
                Some(status) => display.show(status),
                None => warn!(data = %data, "Ignoring unparseable status"),
            }
        });

        let subscription = Subscription::new(self.config.push_endpoint.as_str(), token);
        let conn = StreamConnection::open(
            self.transport.clone(),
            subscription,
            bus,
            &self.config,
        );
        info!(connection = conn.id(), endpoint = %self.config.push_endpoint, "Opened event stream");
        *current = Some(conn);

        TickOutcome::Reconnected
    }

    /// Push the device's current status to the display. Best effort.
    async fn resync(&self) {
        let Some(token) = self.read_credential(CredentialKey::UserToken).await else {
            debug!("Skipping resync: no user token");
            return;
        };
        let Some(device_id) = self.read_credential(CredentialKey::DeviceId).await else {
            debug!("Skipping resync: no device id");
            return;
        };

        match self.status_source.fetch_status(&token, &device_id).await {
            Ok(status) => {
                debug!(%status, "Resynced status");
                self.display.show(status);
            }
            Err(e) => warn!(error = %e, "Status resync failed"),
        }
    }

    async fn read_credential(&self, key: CredentialKey) -> Option<String> {
        match self.credentials.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(%key, error = %e, "Failed to read credential");
                None
            }
        }
    }

    /// Status of the held connection, if any.
    pub async fn connection_status(&self) -> Option<ConnectionStatus> {
        self.current.lock().await.as_ref().map(StreamConnection::status)
    }

    /// Tick on the configured period until `cancel` fires, then dispose the
    /// live connection.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            period_ms = self.config.tick_period_ms,
            stale_threshold_ms = self.config.stale_threshold_ms,
            "Starting reconnect scheduler"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.tick() => {}
                    }
                }
            }
        }

        self.shutdown().await;
        info!("Reconnect scheduler stopped");
    }

    /// Dispose the held connection, if any.
    pub async fn shutdown(&self) {
        if let Some(conn) = self.current.lock().await.take() {
            conn.dispose();
        }
    }

    /// Run the scheduler on its own task.
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        SchedulerHandle { cancel, task }
    }
}

/// Owner of a spawned scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop ticking and wait for the live connection to be disposed.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Reconnect scheduler task failed");
        }
    }
}
