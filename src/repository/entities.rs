//! Advertising entity and metric-fact repositories.
//!
//! Every write is an upsert keyed by the entity's natural external id (or
//! the fact's idempotency id), so at-least-once redelivery replays cleanly.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use crate::models::{Ad, AdGroup, BudgetUsageFact, Campaign, ConversionFact, TargetEntity, TrafficFact};
use crate::schema::{ad_groups, ads, budget_usage, campaigns, conversion_facts, targets, traffic_facts};

/// Repository for stream-delivered entities and facts.
#[derive(Clone)]
pub struct EntityRepository {
    pool: AsyncSqlitePool,
}

impl EntityRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_campaign(&self, campaign: &Campaign) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::replace_into(campaigns::table)
            .values((
                campaigns::campaign_id.eq(&campaign.campaign_id),
                campaigns::name.eq(campaign.name.as_deref()),
                campaigns::state.eq(campaign.state.as_deref()),
                campaigns::budget.eq(campaign.budget),
                campaigns::start_date.eq(campaign.start_date.as_deref()),
                campaigns::end_date.eq(campaign.end_date.as_deref()),
                campaigns::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn upsert_ad_group(&self, ad_group: &AdGroup) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::replace_into(ad_groups::table)
            .values((
                ad_groups::ad_group_id.eq(&ad_group.ad_group_id),
                ad_groups::campaign_id.eq(&ad_group.campaign_id),
                ad_groups::name.eq(ad_group.name.as_deref()),
                ad_groups::state.eq(ad_group.state.as_deref()),
                ad_groups::default_bid.eq(ad_group.default_bid),
                ad_groups::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn upsert_ad(&self, ad: &Ad) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::replace_into(ads::table)
            .values((
                ads::ad_id.eq(&ad.ad_id),
                ads::ad_group_id.eq(&ad.ad_group_id),
                ads::campaign_id.eq(&ad.campaign_id),
                ads::state.eq(ad.state.as_deref()),
                ads::creative.eq(ad.creative.as_deref()),
                ads::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn upsert_target(&self, target: &TargetEntity) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::replace_into(targets::table)
            .values((
                targets::target_id.eq(&target.target_id),
                targets::ad_group_id.eq(&target.ad_group_id),
                targets::campaign_id.eq(&target.campaign_id),
                targets::expression.eq(target.expression.as_deref()),
                targets::state.eq(target.state.as_deref()),
                targets::bid.eq(target.bid),
                targets::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn upsert_traffic_fact(&self, fact: &TrafficFact) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::replace_into(traffic_facts::table)
            .values((
                traffic_facts::idempotency_id.eq(&fact.idempotency_id),
                traffic_facts::time_window_start.eq(&fact.time_window_start),
                traffic_facts::campaign_id.eq(&fact.campaign_id),
                traffic_facts::ad_group_id.eq(fact.ad_group_id.as_deref()),
                traffic_facts::impressions.eq(fact.impressions),
                traffic_facts::clicks.eq(fact.clicks),
                traffic_facts::cost.eq(fact.cost),
                traffic_facts::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn upsert_conversion_fact(&self, fact: &ConversionFact) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::replace_into(conversion_facts::table)
            .values((
                conversion_facts::idempotency_id.eq(&fact.idempotency_id),
                conversion_facts::time_window_start.eq(&fact.time_window_start),
                conversion_facts::campaign_id.eq(&fact.campaign_id),
                conversion_facts::ad_group_id.eq(fact.ad_group_id.as_deref()),
                conversion_facts::conversions.eq(fact.conversions),
                conversion_facts::sales.eq(fact.sales),
                conversion_facts::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn upsert_budget_usage(&self, fact: &BudgetUsageFact) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::replace_into(budget_usage::table)
            .values((
                budget_usage::idempotency_id.eq(&fact.idempotency_id),
                budget_usage::budget_scope_id.eq(&fact.budget_scope_id),
                budget_usage::usage_percent.eq(fact.usage_percent),
                budget_usage::usage_updated_at.eq(&fact.usage_updated_at),
                budget_usage::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Count campaign rows (test/status helper).
    pub async fn campaign_count(&self) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        campaigns::table.select(count_star()).first(&mut conn).await
    }

    /// Count traffic fact rows (test/status helper).
    pub async fn traffic_fact_count(&self) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        traffic_facts::table
            .select(count_star())
            .first(&mut conn)
            .await
    }
}
