//! SQS-backed queue client.
//!
//! Receive/delete/visibility go through the SQS API; the depth and age
//! gauges come from queue attributes and CloudWatch. Gauges are best
//! effort and default to 0 so a metrics blip never stalls the worker.

use async_trait::async_trait;
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{Dimension, Statistic};
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::QueueAttributeName;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{QueueClient, QueueMessage, QueueMetric, MAX_BATCH_SIZE};
use crate::config::QueueSettings;
use crate::error::{Error, Result};

/// SQS implementation of [`QueueClient`].
#[derive(Clone)]
pub struct SqsQueueClient {
    sqs: aws_sdk_sqs::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
    queue_url: String,
    queue_name: String,
}

impl SqsQueueClient {
    /// Connect using the standard AWS credential chain. A custom endpoint
    /// (for local queues) can be configured in settings.
    pub async fn connect(settings: &QueueSettings) -> Result<Self> {
        if settings.url.is_empty() {
            return Err(Error::Validation("queue.url is not configured".into()));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let queue_name = settings
            .url
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            sqs: aws_sdk_sqs::Client::new(&shared),
            cloudwatch: aws_sdk_cloudwatch::Client::new(&shared),
            queue_url: settings.url.clone(),
            queue_name,
        })
    }

    /// Classify an SDK error: credential problems are terminal at startup,
    /// everything else is transient.
    fn classify<E: std::error::Error + Send + Sync + 'static>(
        err: aws_sdk_sqs::error::SdkError<E>,
    ) -> Error {
        let message = format!("{}", DisplayErrorContext(&err));
        let lowered = message.to_lowercase();
        if lowered.contains("credential") || lowered.contains("access denied") {
            Error::Credential(message)
        } else {
            Error::Transient(message)
        }
    }

    async fn queue_attribute(&self, name: QueueAttributeName) -> Result<Option<String>> {
        let output = self
            .sqs
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(name.clone())
            .send()
            .await
            .map_err(Self::classify)?;

        Ok(output
            .attributes()
            .and_then(|attrs| attrs.get(&name).cloned()))
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn check(&self) -> Result<()> {
        self.queue_attribute(QueueAttributeName::ApproximateNumberOfMessages)
            .await
            .map(|_| ())
    }

    async fn receive(&self, max_wait_secs: u16) -> Result<Vec<QueueMessage>> {
        let output = self
            .sqs
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(MAX_BATCH_SIZE)
            .wait_time_seconds(max_wait_secs as i32)
            .send()
            .await
            .map_err(Self::classify)?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| {
                // A message without a receipt handle cannot be acknowledged;
                // skip it and let the queue redeliver
                let receipt_handle = message.receipt_handle?;
                Some(QueueMessage {
                    message_id: message.message_id.unwrap_or_default(),
                    receipt_handle,
                    body: message.body.unwrap_or_default(),
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        let result = self
            .sqs
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let message = format!("{}", DisplayErrorContext(&err));
                // Deleting an already-deleted or expired handle is fine
                if message.contains("ReceiptHandleIsInvalid")
                    || message.contains("InvalidParameterValue")
                {
                    debug!("delete of expired receipt handle ignored: {}", message);
                    Ok(())
                } else {
                    Err(Self::classify(err))
                }
            }
        }
    }

    async fn extend_visibility(&self, receipt_handle: &str, seconds: u32) -> Result<()> {
        self.sqs
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(seconds as i32)
            .send()
            .await
            .map_err(Self::classify)?;
        Ok(())
    }

    async fn approximate_depth(&self) -> u64 {
        match self
            .queue_attribute(QueueAttributeName::ApproximateNumberOfMessages)
            .await
        {
            Ok(Some(value)) => value.parse().unwrap_or(0),
            Ok(None) => 0,
            Err(err) => {
                warn!("queue depth lookup failed: {}", err);
                0
            }
        }
    }

    async fn oldest_message_age_secs(&self) -> u64 {
        let to = Utc::now();
        let from = to - chrono::Duration::minutes(10);

        let result = self
            .cloudwatch
            .get_metric_statistics()
            .namespace("AWS/SQS")
            .metric_name("ApproximateAgeOfOldestMessage")
            .dimensions(
                Dimension::builder()
                    .name("QueueName")
                    .value(&self.queue_name)
                    .build(),
            )
            .start_time(AwsDateTime::from_millis(from.timestamp_millis()))
            .end_time(AwsDateTime::from_millis(to.timestamp_millis()))
            .period(60)
            .statistics(Statistic::Maximum)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    "oldest message age lookup failed: {}",
                    DisplayErrorContext(&err)
                );
                return 0;
            }
        };

        // Most recent datapoint wins
        output
            .datapoints()
            .iter()
            .max_by_key(|dp| dp.timestamp().map(|ts| ts.secs()).unwrap_or(0))
            .and_then(|dp| dp.maximum())
            .map(|age| age as u64)
            .unwrap_or(0)
    }

    async fn dead_letter_target(&self) -> Option<String> {
        let raw = match self.queue_attribute(QueueAttributeName::RedrivePolicy).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("redrive policy lookup failed: {}", err);
                return None;
            }
        };

        serde_json::from_str::<serde_json::Value>(&raw)
            .ok()?
            .get("deadLetterTargetArn")?
            .as_str()
            .map(|arn| arn.to_string())
    }

    async fn windowed_counts(
        &self,
        metric: QueueMetric,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<u64> {
        let minutes = ((to - from).num_seconds() / 60).max(0) as usize;
        let mut buckets = vec![0u64; minutes];
        if minutes == 0 {
            return buckets;
        }

        let result = self
            .cloudwatch
            .get_metric_statistics()
            .namespace("AWS/SQS")
            .metric_name(metric.metric_name())
            .dimensions(
                Dimension::builder()
                    .name("QueueName")
                    .value(&self.queue_name)
                    .build(),
            )
            .start_time(AwsDateTime::from_millis(from.timestamp_millis()))
            .end_time(AwsDateTime::from_millis(to.timestamp_millis()))
            .period(60)
            .statistics(Statistic::Sum)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    "windowed count lookup failed: {}",
                    DisplayErrorContext(&err)
                );
                return buckets;
            }
        };

        // Zero-fill: a minute with no datapoint means zero, not error
        for datapoint in output.datapoints() {
            let (Some(timestamp), Some(sum)) = (datapoint.timestamp(), datapoint.sum()) else {
                continue;
            };
            let offset_secs = timestamp.secs() - from.timestamp();
            if offset_secs < 0 {
                continue;
            }
            let index = (offset_secs / 60) as usize;
            if index < buckets.len() {
                buckets[index] = sum as u64;
            }
        }

        buckets
    }
}
