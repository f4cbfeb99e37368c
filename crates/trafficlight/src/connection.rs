//! A single long-lived subscription to the push stream.
//!
//! Opening a [`StreamConnection`] spawns one reader task that owns the
//! underlying response body. Every chunk it receives:
//!
//! 1. touches the connection's [`LivenessTracker`],
//! 2. is decoded with [`frame::decode`],
//! 3. is published on the connection's [`EventBus`] when the record's event
//!    name resolves to an [`EventKind`].
//!
//! Transport failures are logged and end the reader task. They are not
//! retried here; the connection simply stops being touched and goes
//! [`ConnectionStatus::Closed`] once the staleness threshold passes. Replacing
//! it is the scheduler's job.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::event::{EventBus, EventKind};
use crate::frame;
use crate::liveness::{ConnectionStatus, LivenessTracker};
use crate::transport::{EventTransport, Subscription};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one open subscription.
///
/// Dropping the handle disposes the connection.
pub struct StreamConnection {
    id: u64,
    bus: EventBus,
    liveness: Arc<LivenessTracker>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl StreamConnection {
    /// Open `subscription` on `transport` and start reading.
    ///
    /// Records are published on `bus`; listeners can be registered on it
    /// before opening so that no early record is missed. Must be called from
    /// within a tokio runtime.
    pub fn open(
        transport: Arc<dyn EventTransport>,
        subscription: Subscription,
        bus: EventBus,
        config: &StreamConfig,
    ) -> Self {
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        let liveness = Arc::new(LivenessTracker::new(config.stale_threshold()));
        let cancel = CancellationToken::new();

        let reader = StreamReader {
            id,
            bus: bus.clone(),
            liveness: liveness.clone(),
            config: config.clone(),
        };
        let task = tokio::spawn(reader.run(transport, subscription, cancel.clone()));

        Self {
            id,
            bus,
            liveness,
            cancel,
            task: Mutex::new(Some(task)),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Liveness derived from traffic timing. A disposed connection is always
    /// closed.
    pub fn status(&self) -> ConnectionStatus {
        if self.is_disposed() {
            ConnectionStatus::Closed
        } else {
            self.liveness.status()
        }
    }

    pub fn liveness(&self) -> &LivenessTracker {
        &self.liveness
    }

    /// Register a listener for records of `kind`.
    ///
    /// Returns `false` once the connection has been disposed.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> bool
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.bus.on(kind, listener)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Tear the connection down. Idempotent.
    ///
    /// Listeners are unregistered before the reader is cancelled, so once this
    /// returns no listener of this connection runs again, even if the
    /// transport still holds unread chunks.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.bus.close();
        self.cancel.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        debug!(connection = self.id, "Disposed event stream connection");
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// State owned by the reader task.
struct StreamReader {
    id: u64,
    bus: EventBus,
    liveness: Arc<LivenessTracker>,
    config: StreamConfig,
}

impl StreamReader {
    async fn run(
        self,
        transport: Arc<dyn EventTransport>,
        subscription: Subscription,
        cancel: CancellationToken,
    ) {
        let subscribed = tokio::select! {
            _ = cancel.cancelled() => return,
            result = transport.subscribe(&subscription) => result,
        };

        let mut stream = match subscribed {
            Ok(stream) => stream,
            Err(e) => {
                warn!(connection = self.id, url = %subscription.url, error = %e, "Failed to open event stream");
                return;
            }
        };
        info!(connection = self.id, url = %subscription.url, "Subscribed to event stream");

        loop {
            let next = tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => self.handle_chunk(&chunk),
                Some(Err(e)) => {
                    warn!(connection = self.id, error = %e, "Event stream error");
                    break;
                }
                None => {
                    warn!(connection = self.id, "Event stream closed by peer");
                    break;
                }
            }
        }

        debug!(connection = self.id, "Event stream reader stopped");
    }

    fn handle_chunk(&self, chunk: &[u8]) {
        // Any traffic counts, whether or not it decodes to a record.
        self.liveness.touch();

        let Some(record) = frame::decode(chunk) else {
            trace!(connection = self.id, len = chunk.len(), "Chunk without event");
            return;
        };

        match EventKind::resolve(&record.event, &self.config) {
            Some(kind) => {
                let delivered = self.bus.publish(kind, &record.data);
                trace!(
                    connection = self.id,
                    event = %record.event,
                    ?kind,
                    delivered,
                    "Published record"
                );
            }
            None => {
                trace!(connection = self.id, event = %record.event, "Ignoring unhandled event");
            }
        }
    }
}
