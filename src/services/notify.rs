//! Fire-and-forget metadata-change notifications.
//!
//! The UI collaborator refreshes itself off these events. Delivery is
//! best effort over a bounded channel: a slow or absent consumer never
//! adds latency to the refresh critical path.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::ReportDatasetKey;

/// A report-dataset row changed.
#[derive(Debug, Clone)]
pub struct MetadataChanged {
    pub key: ReportDatasetKey,
    pub at: DateTime<Utc>,
}

/// Best-effort publisher of [`MetadataChanged`] events.
#[derive(Clone)]
pub struct MetadataNotifier {
    tx: Option<mpsc::Sender<MetadataChanged>>,
}

impl MetadataNotifier {
    /// Create a notifier and the receiver the UI collaborator consumes.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MetadataChanged>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier with no consumer; every publish is a no-op.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Publish a change. Never blocks; a full channel drops the event.
    pub fn notify(&self, key: &ReportDatasetKey) {
        let Some(tx) = &self.tx else {
            return;
        };
        let event = MetadataChanged {
            key: key.clone(),
            at: Utc::now(),
        };
        if let Err(err) = tx.try_send(event) {
            debug!(key = %key, "dropping metadata notification: {}", err);
        }
    }
}
