use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, watch};

use crate::display::StatusCode;
use crate::error::{Error, Result};
use crate::particle::StatusSource;
use crate::transport::{ChunkStream, EventTransport, Subscription};

/// Initialize tracing for tests with appropriate settings
#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer() // Write to test output
        .try_init();
}

/// Transport whose streams are fed by the test.
///
/// Each `subscribe` takes the next queued stream, in order. Subscribing with
/// nothing queued fails like a refused connection.
pub struct ChannelTransport {
    queued: Mutex<VecDeque<mpsc::UnboundedReceiver<Bytes>>>,
    subscriptions: Mutex<Vec<Subscription>>,
    subscribed: watch::Sender<usize>,
}

impl ChannelTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queued: Mutex::new(VecDeque::new()),
            subscriptions: Mutex::new(Vec::new()),
            subscribed: watch::Sender::new(0),
        })
    }

    /// Queue a stream for the next subscription and return its feeding end.
    /// Dropping the sender ends the stream.
    pub fn push_stream(&self) -> mpsc::UnboundedSender<Bytes> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queued.lock().push_back(rx);
        tx
    }

    /// Every subscription attempted so far.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.lock().clone()
    }

    /// Wait until at least `count` subscriptions have been attempted.
    pub async fn wait_for_subscriptions(&self, count: usize) -> Vec<Subscription> {
        let mut rx = self.subscribed.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|n| *n >= count))
            .await
            .expect("timed out waiting for subscriptions")
            .expect("transport dropped");
        self.subscriptions()
    }
}

#[async_trait]
impl EventTransport for ChannelTransport {
    async fn subscribe(&self, subscription: &Subscription) -> Result<ChunkStream> {
        let queued = {
            let mut subscriptions = self.subscriptions.lock();
            subscriptions.push(subscription.clone());
            self.subscribed.send_replace(subscriptions.len());
            self.queued.lock().pop_front()
        };

        let rx = queued.ok_or_else(|| {
            Error::from(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "no stream queued",
            ))
        })?;

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok(chunk), rx))
        })
        .boxed())
    }
}

/// Lets a test hold a [`FakeStatusSource`] inside `fetch_status`.
#[derive(Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Resolves once a fetch is parked at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Status source with a fixed answer.
pub struct FakeStatusSource {
    result: Option<i64>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, String)>>,
    gate: Option<Gate>,
}

impl FakeStatusSource {
    fn build(result: Option<i64>, gate: Option<Gate>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            gate,
        }
    }

    pub fn returning(code: i64) -> Self {
        Self::build(Some(code), None)
    }

    pub fn failing() -> Self {
        Self::build(None, None)
    }

    /// Returns `code`, but only after the returned gate is released.
    pub fn gated(code: i64) -> (Self, Gate) {
        let gate = Gate::default();
        (Self::build(Some(code), Some(gate.clone())), gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(String, String)> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl StatusSource for FakeStatusSource {
    async fn fetch_status(&self, token: &str, device_id: &str) -> Result<StatusCode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some((token.to_owned(), device_id.to_owned()));

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.result
            .map(StatusCode)
            .ok_or_else(|| Error::invalid_response("status unavailable"))
    }
}
