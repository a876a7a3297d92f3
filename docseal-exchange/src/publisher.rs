//! Reliable batch publishing.
//!
//! Documents are split into consecutive batches of at most `batch_size`.
//! Each batch is handed to the transport until it is accepted or its retry
//! budget is spent, then the publisher moves on to the next batch. Failures
//! never abort the run; they are recorded in the [`PublishReport`].

use crate::config::PublishConfig;
use crate::document::{Document, DocumentBatch};
use crate::error::{ExchangeError, ExchangeResult};
use async_trait::async_trait;
use std::num::NonZeroUsize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Delivers one batch downstream.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    /// Sends `batch` under `topic`. `Ok` means the batch was accepted.
    async fn send(&self, topic: &str, batch: &DocumentBatch) -> ExchangeResult<()>;
}

/// Splits documents into consecutive batches of at most `batch_size`,
/// preserving order.
pub fn partition(documents: Vec<Document>, batch_size: NonZeroUsize) -> Vec<DocumentBatch> {
    let size = batch_size.get();
    let mut batches = Vec::with_capacity(documents.len().div_ceil(size));
    let mut documents = documents.into_iter().peekable();
    while documents.peek().is_some() {
        batches.push(DocumentBatch::new(documents.by_ref().take(size).collect()));
    }
    batches
}

/// What happened to one batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    pub index: usize,
    pub size: usize,
    /// Number of `send` calls made for this batch.
    pub attempts: u32,
    pub delivered: bool,
    /// Last transport error, when not delivered.
    pub error: Option<String>,
}

/// Per-batch results of one publish run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl PublishReport {
    /// True when every batch was delivered.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.delivered)
    }

    pub fn delivered(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.delivered)
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.delivered)
    }

    pub fn documents_delivered(&self) -> usize {
        self.delivered().map(|outcome| outcome.size).sum()
    }

    pub fn total_attempts(&self) -> u32 {
        self.outcomes.iter().map(|outcome| outcome.attempts).sum()
    }
}

/// Publishes documents in batches over an owned transport.
pub struct BatchPublisher {
    transport: Box<dyn BatchTransport>,
    topic: String,
    batch_size: NonZeroUsize,
    max_retries: u32,
}

impl BatchPublisher {
    /// Builds a publisher. `batch_size` must be at least 1.
    pub fn new(
        transport: Box<dyn BatchTransport>,
        topic: impl Into<String>,
        batch_size: usize,
        max_retries: u32,
    ) -> ExchangeResult<Self> {
        let batch_size = NonZeroUsize::new(batch_size)
            .ok_or_else(|| ExchangeError::Config("batch size must be at least 1".into()))?;
        Ok(Self {
            transport,
            topic: topic.into(),
            batch_size,
            max_retries,
        })
    }

    pub fn from_config(
        transport: Box<dyn BatchTransport>,
        config: &PublishConfig,
    ) -> ExchangeResult<Self> {
        Self::new(transport, config.topic.clone(), config.batch_size, config.retry_count)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publishes every document, batch by batch.
    pub async fn publish(&self, documents: Vec<Document>) -> PublishReport {
        let total = documents.len();
        let batches = partition(documents, self.batch_size);
        let mut report = PublishReport {
            outcomes: Vec::with_capacity(batches.len()),
        };

        for (index, batch) in batches.iter().enumerate() {
            let outcome = self.publish_batch(index, batch).await;
            report.outcomes.push(outcome);
        }

        let failed = report.failed().count();
        if failed == 0 {
            info!(topic = %self.topic, documents = total, batches = batches.len(), "published documents");
        } else {
            warn!(
                topic = %self.topic,
                documents = total,
                batches = batches.len(),
                failed,
                "published documents with failed batches"
            );
        }
        report
    }

    async fn publish_batch(&self, index: usize, batch: &DocumentBatch) -> BatchOutcome {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts <= self.max_retries {
            attempts += 1;
            match self.transport.send(&self.topic, batch).await {
                Ok(()) => {
                    debug!(batch = index, size = batch.len(), attempts, "batch delivered");
                    return BatchOutcome {
                        index,
                        size: batch.len(),
                        attempts,
                        delivered: true,
                        error: None,
                    };
                }
                Err(err) => {
                    warn!(batch = index, attempt = attempts, error = %err, "batch send failed");
                    last_error = Some(err.to_string());
                }
            }
        }

        warn!(batch = index, size = batch.len(), attempts, "batch abandoned after retries");
        BatchOutcome {
            index,
            size: batch.len(),
            attempts,
            delivered: false,
            error: last_error,
        }
    }
}

// ── ChannelTransport ────────────────────────────────────────────

/// A batch received from a [`ChannelTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedBatch {
    pub topic: String,
    pub batch: DocumentBatch,
}

/// In-process hand-off to a downstream consumer over a bounded channel.
pub struct ChannelTransport {
    sender: mpsc::Sender<PublishedBatch>,
}

impl ChannelTransport {
    /// Creates the transport and the receiving end the consumer reads.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PublishedBatch>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl BatchTransport for ChannelTransport {
    async fn send(&self, topic: &str, batch: &DocumentBatch) -> ExchangeResult<()> {
        self.sender
            .send(PublishedBatch {
                topic: topic.to_string(),
                batch: batch.clone(),
            })
            .await
            .map_err(|_| ExchangeError::Transport("downstream receiver closed".into()))
    }
}
