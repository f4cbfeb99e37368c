//! Transport seam for the push stream.
//!
//! A transport turns a [`Subscription`] into a stream of raw byte chunks. The
//! chunk boundaries are whatever the network delivered; decoding happens in
//! the connection, not here.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderValue};
use tracing::debug;

use crate::config::StreamConfig;
use crate::error::{Error, Result};

/// Raw chunks delivered by an open subscription.
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

/// Endpoint and bearer token a stream is opened against.
///
/// Rebuilt from the credential store on every reconnect, so a rotated token
/// only takes effect on the next connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Subscription {
    pub url: String,
    pub token: String,
}

impl Subscription {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Opens long-lived chunk streams.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open the subscription. Resolves once the response has started; the
    /// returned stream yields chunks until the peer or the network ends it.
    async fn subscribe(&self, subscription: &Subscription) -> Result<ChunkStream>;
}

/// Streams the push endpoint over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport suited to a never-ending response body: no overall
    /// request timeout, since liveness is judged by traffic timing instead.
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn subscribe(&self, subscription: &Subscription) -> Result<ChunkStream> {
        debug!(url = %subscription.url, "Opening event stream");

        let response = self
            .client
            .get(&subscription.url)
            .bearer_auth(&subscription.token)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(
                status,
                subscription.url.clone(),
                "event stream subscribe",
            ));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from))
            .boxed())
    }
}
