//! Queue ingestion worker.
//!
//! Long-polls the queue and feeds each message through the payload
//! router. The control record is re-read at the top of every cycle, so
//! pausing the worker or changing its rate takes effect within one poll
//! without a restart. One bad message never blocks its batch: the
//! failure is logged, the message stays on the queue, and redelivery
//! eventually dead-letters it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::router::PayloadRouter;
use crate::config::WorkerSettings;
use crate::error::{Error, Result};
use crate::queue::{QueueClient, QueueMessage};
use crate::ratelimit::RateLimiter;
use crate::repository::ControlRepository;

/// Polls the queue until told to shut down.
pub struct IngestionWorker {
    control: ControlRepository,
    queue: Arc<dyn QueueClient>,
    router: Arc<PayloadRouter>,
    settings: WorkerSettings,
    receive_wait_secs: u16,
    shutdown: watch::Receiver<bool>,
    limiter: RateLimiter,
    limiter_rate: u32,
}

impl IngestionWorker {
    pub fn new(
        control: ControlRepository,
        queue: Arc<dyn QueueClient>,
        router: Arc<PayloadRouter>,
        settings: WorkerSettings,
        receive_wait_secs: u16,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            control,
            queue,
            router,
            settings,
            receive_wait_secs,
            shutdown,
            limiter: RateLimiter::from_rate(0),
            limiter_rate: 0,
        }
    }

    /// Run the poll loop until the shutdown signal fires.
    ///
    /// Draining semantics: the message being processed when the signal
    /// arrives finishes and is acknowledged; the rest of its batch stays
    /// on the queue and redelivers after the visibility timeout.
    pub async fn run(mut self) -> Result<()> {
        info!("ingestion worker started");

        while !*self.shutdown.borrow() {
            let control = match self.control.get_or_init().await {
                Ok(control) => control,
                Err(err) => {
                    warn!("failed to read control record: {}", err);
                    self.sleep_interruptible(self.settings.error_backoff_secs)
                        .await;
                    continue;
                }
            };

            if !control.enabled {
                debug!("ingestion disabled, idling");
                self.sleep_interruptible(self.settings.disabled_poll_secs)
                    .await;
                continue;
            }

            // Rebuild the limiter only when the configured rate moved, so
            // pacing carries across poll cycles at a steady rate
            if control.messages_per_second != self.limiter_rate {
                info!(
                    rate = control.messages_per_second,
                    "applying new message rate"
                );
                self.limiter = RateLimiter::from_rate(control.messages_per_second);
                self.limiter_rate = control.messages_per_second;
            }

            let batch = match self.queue.receive(self.receive_wait_secs).await {
                Ok(batch) => batch,
                Err(err) if err.is_transient() => {
                    warn!("receive failed: {}", err);
                    self.sleep_interruptible(self.settings.error_backoff_secs)
                        .await;
                    continue;
                }
                Err(err) => {
                    // Credential-class failures need operator action; retry
                    // on the slow cadence instead of hammering the queue
                    error!("receive failed: {}", err);
                    self.sleep_interruptible(self.settings.disabled_poll_secs)
                        .await;
                    continue;
                }
            };

            if batch.is_empty() {
                self.sleep_interruptible(self.settings.idle_backoff_secs)
                    .await;
                continue;
            }

            debug!(count = batch.len(), "received batch");
            for message in batch {
                if *self.shutdown.borrow() {
                    debug!("shutdown requested, draining remainder of batch");
                    break;
                }
                if let Err(err) = self.process(&message).await {
                    // Isolation: the message stays on the queue and the
                    // rest of the batch still runs
                    warn!(
                        message_id = %message.message_id,
                        "message failed, leaving on queue: {}",
                        err
                    );
                }
            }
        }

        info!("ingestion worker stopped");
        Ok(())
    }

    async fn process(&self, message: &QueueMessage) -> Result<()> {
        self.limiter
            .schedule(async {
                let payload: serde_json::Value = serde_json::from_str(&message.body)
                    .map_err(|e| Error::Validation(format!("unparseable body: {}", e)))?;
                self.router.route(&payload).await?;
                self.queue.delete(&message.receipt_handle).await
            })
            .await
    }

    async fn sleep_interruptible(&mut self, secs: u64) {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}
