use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::feed::FeedParser;
use crate::stream::{SnapshotSource, spawn_change_loop};
use crate::types::{GameUpdate, Snapshot};

/// Notification buffer used by [`FeedClient::stream_updates`].
pub const DEFAULT_UPDATE_BUFFER: usize = 16;

/// Client of the XML lottery feed.
#[derive(Debug, Clone)]
pub struct FeedClient {
    url: String,
    http: reqwest::Client,
    parser: FeedParser,
    update_buffer: usize,
}

impl FeedClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_http_client(url, reqwest::Client::new())
    }

    pub fn with_http_client(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
            parser: FeedParser::default(),
            update_buffer: DEFAULT_UPDATE_BUFFER,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let http = builder.build()?;

        Ok(Self::with_http_client(config.feed_url.clone(), http)
            .with_update_buffer(config.update_buffer))
    }

    pub fn with_parser(mut self, parser: FeedParser) -> Self {
        self.parser = parser;
        self
    }

    /// Capacity of the change stream channel. Zero is treated as one.
    pub fn with_update_buffer(mut self, update_buffer: usize) -> Self {
        self.update_buffer = update_buffer.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Retrieve a snapshot of the current feed state.
    ///
    /// Issues a single GET. Cancelling `cancel` aborts the request in flight
    /// and returns [`FeedError::Cancelled`].
    pub async fn load(&self, cancel: &CancellationToken) -> Result<Snapshot> {
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FeedError::Cancelled),
            body = self.fetch() => body?,
        };
        self.parser.parse(&body)
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        debug!("Fetching lottery feed from: {}", self.url);

        let response = self.http.get(&self.url).send().await?.error_for_status()?;
        let body = response.bytes().await?;

        debug!("Received {} bytes from {}", body.len(), self.url);
        Ok(body.to_vec())
    }

    /// Poll the feed every `interval` and stream games that changed.
    ///
    /// A game counts as changed when any of its fields differ from the
    /// previous successful load, or when it was missing from it. The first
    /// load happens immediately and reports every game. Failed loads are
    /// reported as [`GameUpdate::Error`] and do not stop polling; the stream
    /// ends once `cancel` is triggered.
    ///
    /// The feed is known to drop and later re-introduce the same games, so
    /// the stream will often repeat games that did not really change.
    pub fn stream_updates(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<GameUpdate> {
        spawn_change_loop(self.clone(), interval, cancel, self.update_buffer)
    }
}

#[async_trait]
impl SnapshotSource for FeedClient {
    async fn load(&self, cancel: &CancellationToken) -> Result<Snapshot> {
        FeedClient::load(self, cancel).await
    }
}
