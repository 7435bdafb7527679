//! Payload routing.
//!
//! Each stream message carries a `dataset_id` discriminator naming which
//! dataset it belongs to. Known datasets dispatch to a typed upsert;
//! unknown ones are counted and acknowledged so upstream schema drift
//! never poison-pills the queue. A payload that names a known dataset but
//! fails validation is a hard error - the message stays on the queue and
//! eventually dead-letters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{Ad, AdGroup, BudgetUsageFact, Campaign, ConversionFact, TargetEntity, TrafficFact};
use crate::repository::EntityRepository;

/// Routes parsed stream payloads to their dataset handlers.
pub struct PayloadRouter {
    entities: EntityRepository,
    unknown: AtomicU64,
}

impl PayloadRouter {
    pub fn new(entities: EntityRepository) -> Self {
        Self {
            entities,
            unknown: AtomicU64::new(0),
        }
    }

    /// Messages acknowledged despite an unrecognized discriminator.
    ///
    /// Silent drops mask upstream schema changes, so the count is kept
    /// observable even though the drop itself is deliberate.
    pub fn unknown_count(&self) -> u64 {
        self.unknown.load(Ordering::Relaxed)
    }

    /// Dispatch one payload. `Ok` means the message may be acknowledged.
    pub async fn route(&self, payload: &serde_json::Value) -> Result<()> {
        let dataset_id = payload
            .get("dataset_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("payload has no dataset_id".into()))?;

        match dataset_id {
            "campaigns" => {
                let campaign: Campaign = parse(payload)?;
                require_id("campaign_id", &campaign.campaign_id)?;
                self.entities.upsert_campaign(&campaign).await?;
            }
            "ad-groups" | "adgroups" => {
                let ad_group: AdGroup = parse(payload)?;
                require_id("ad_group_id", &ad_group.ad_group_id)?;
                self.entities.upsert_ad_group(&ad_group).await?;
            }
            "ads" => {
                let ad: Ad = parse(payload)?;
                require_id("ad_id", &ad.ad_id)?;
                self.entities.upsert_ad(&ad).await?;
            }
            "targets" => {
                let target: TargetEntity = parse(payload)?;
                require_id("target_id", &target.target_id)?;
                self.entities.upsert_target(&target).await?;
            }
            id if id.ends_with("-traffic") => {
                let fact: TrafficFact = parse(payload)?;
                require_id("idempotency_id", &fact.idempotency_id)?;
                self.entities.upsert_traffic_fact(&fact).await?;
            }
            id if id.ends_with("-conversion") => {
                let fact: ConversionFact = parse(payload)?;
                require_id("idempotency_id", &fact.idempotency_id)?;
                self.entities.upsert_conversion_fact(&fact).await?;
            }
            "budget-usage" => {
                let fact: BudgetUsageFact = parse(payload)?;
                require_id("idempotency_id", &fact.idempotency_id)?;
                self.entities.upsert_budget_usage(&fact).await?;
            }
            other => {
                // Deliberate tolerance: acknowledge so schema drift from the
                // upstream provider cannot poison-pill the queue
                self.unknown.fetch_add(1, Ordering::Relaxed);
                warn!(dataset_id = %other, "unknown dataset discriminator, acknowledging");
                return Ok(());
            }
        }

        debug!(dataset_id = %dataset_id, "payload stored");
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(payload: &serde_json::Value) -> Result<T> {
    serde_json::from_value(payload.clone()).map_err(|e| Error::Validation(e.to_string()))
}

fn require_id(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("{} is empty", field)));
    }
    Ok(())
}
