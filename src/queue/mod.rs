//! Queue boundary.
//!
//! The worker talks to the message queue through the [`QueueClient`]
//! trait; the production implementation is SQS ([`sqs::SqsQueueClient`]).
//! Tests substitute scripted in-memory clients.

mod sqs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

pub use sqs::SqsQueueClient;

/// Largest batch a single receive call may return.
pub const MAX_BATCH_SIZE: i32 = 10;

/// A single message received from the queue. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    /// Opaque token used to acknowledge (delete) the message.
    pub receipt_handle: String,
    pub body: String,
}

/// Windowed throughput metric selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMetric {
    Sent,
    Received,
    Deleted,
}

impl QueueMetric {
    /// CloudWatch metric name for this selector.
    pub fn metric_name(&self) -> &'static str {
        match self {
            Self::Sent => "NumberOfMessagesSent",
            Self::Received => "NumberOfMessagesReceived",
            Self::Deleted => "NumberOfMessagesDeleted",
        }
    }
}

/// Receive/acknowledge operations plus best-effort attribute gauges.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Verify the queue is reachable with the current credentials.
    ///
    /// Unlike the gauges below, errors here propagate: the worker treats a
    /// failed check at startup as fatal.
    async fn check(&self) -> Result<()>;

    /// Long-poll for up to `max_wait_secs`. An empty batch is a normal
    /// outcome, not an error; at most [`MAX_BATCH_SIZE`] messages return.
    async fn receive(&self, max_wait_secs: u16) -> Result<Vec<QueueMessage>>;

    /// Acknowledge a message. Idempotent: deleting an expired or unknown
    /// handle is not fatal.
    async fn delete(&self, receipt_handle: &str) -> Result<()>;

    /// Push out the visibility timeout for a message still being worked.
    async fn extend_visibility(&self, receipt_handle: &str, seconds: u32) -> Result<()>;

    /// Approximate number of messages waiting. Best effort; 0 on failure.
    async fn approximate_depth(&self) -> u64;

    /// Age of the oldest message in seconds. Best effort; 0 on failure.
    async fn oldest_message_age_secs(&self) -> u64;

    /// Dead-letter target from the queue's redrive policy, if configured.
    /// Absence is a normal outcome.
    async fn dead_letter_target(&self) -> Option<String>;

    /// Per-minute counts for `metric` between `from` and `to`, zero-filled
    /// for minutes with no datapoint (metric stores are eventually
    /// consistent; a missing bucket means zero, not error).
    async fn windowed_counts(
        &self,
        metric: QueueMetric,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<u64>;
}
