//! Elasticsearch delivery for telemetry events
//!
//! [`ElasticsearchSink::spawn`] starts a worker task that drains a bounded
//! queue and indexes each event with `POST {url}/{index}/_doc`. Enqueueing
//! never waits: when the queue is full or the worker is gone the event is
//! dropped and a warning is logged locally. Each write runs under its own
//! deadline so a slow cluster only ever delays the worker.
//!
//! ```rust,no_run
//! use token_warden::telemetry::{ElasticsearchConfig, ElasticsearchSink, Telemetry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, worker) = ElasticsearchSink::spawn(ElasticsearchConfig::default());
//! let telemetry = Telemetry::new(sink);
//! // ... build validators with `telemetry` ...
//! drop(telemetry);
//! worker.closed().await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::error::index_document_error;
use crate::error::Result;
use crate::telemetry::TelemetryEvent;
use crate::telemetry::TelemetrySink;

pub const DEFAULT_ELASTICSEARCH_URL: &str = "http://localhost:9200";
pub const DEFAULT_INDEX: &str = "jwt-logs";

const DEFAULT_WRITE_TIMEOUT_MILLIS: u64 = 2000;
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Configuration for the Elasticsearch sink
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    /// Base URL of the cluster
    pub(crate) url: String,
    /// Index the events are written to (default: `jwt-logs`)
    pub(crate) index: String,
    /// Deadline for a single index request
    pub(crate) write_timeout: Duration,
    /// Events buffered between validation and the worker
    pub(crate) queue_capacity: usize,
    /// Optional custom HTTP client
    pub(crate) http_client: Option<Client>,
}

impl ElasticsearchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            index: DEFAULT_INDEX.to_string(),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MILLIS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            http_client: None,
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the queue capacity; zero is raised to one
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("{}/{}/_doc", self.url.trim_end_matches('/'), self.index)
    }
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ELASTICSEARCH_URL)
    }
}

/// Fire-and-forget sink backed by an Elasticsearch index
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    sender: mpsc::Sender<TelemetryEvent>,
}

/// Handle to the background worker of an [`ElasticsearchSink`]
#[derive(Debug)]
pub struct SinkWorker {
    handle: JoinHandle<()>,
}

impl ElasticsearchSink {
    /// Start the indexing worker on the current tokio runtime
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn(config: ElasticsearchConfig) -> (Self, SinkWorker) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let endpoint = config.endpoint();
        let client = config.http_client.unwrap_or_default();

        let handle = tokio::spawn(run_worker(client, endpoint, config.write_timeout, receiver));

        (Self { sender }, SinkWorker { handle })
    }
}

impl TelemetrySink for ElasticsearchSink {
    fn index_document(&self, event: TelemetryEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    event_message = %event.message,
                    "telemetry queue full, dropping event"
                );
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    event_message = %event.message,
                    "telemetry worker stopped, dropping event"
                );
            }
        }
    }
}

impl SinkWorker {
    /// Wait until every sink handle is dropped and the queue is drained
    pub async fn closed(self) {
        if let Err(err) = self.handle.await {
            tracing::warn!(error = %err, "telemetry worker terminated abnormally");
        }
    }
}

async fn run_worker(
    client: Client,
    endpoint: String,
    write_timeout: Duration,
    mut receiver: mpsc::Receiver<TelemetryEvent>,
) {
    while let Some(event) = receiver.recv().await {
        match tokio::time::timeout(write_timeout, index_document(&client, &endpoint, &event)).await
        {
            Ok(Ok(())) => tracing::trace!(endpoint = %endpoint, "telemetry event indexed"),
            Ok(Err(err)) => tracing::warn!(error = %err, "failed to index telemetry event"),
            Err(_) => tracing::warn!(
                timeout_ms = write_timeout.as_millis() as u64,
                "indexing telemetry event timed out"
            ),
        }
    }
    tracing::debug!("telemetry worker shutting down");
}

async fn index_document(client: &Client, endpoint: &str, event: &TelemetryEvent) -> Result<()> {
    client
        .post(endpoint)
        .json(event)
        .send()
        .await
        .map_err(index_document_error)?
        .error_for_status()
        .map_err(index_document_error)?;
    Ok(())
}
