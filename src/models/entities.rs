//! Advertising entity and metric-fact payloads.
//!
//! These mirror the shapes delivered on the stream. Entities carry their
//! natural external id; metric facts carry the provider's idempotency id.
//! Both make at-least-once redelivery safe to replay as upserts.

use serde::{Deserialize, Serialize};

/// Campaign create/update event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// Ad group create/update event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdGroup {
    pub ad_group_id: String,
    pub campaign_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub default_bid: Option<f64>,
}

/// Ad create/update event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ad {
    pub ad_id: String,
    pub ad_group_id: String,
    pub campaign_id: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub creative: Option<String>,
}

/// Targeting clause create/update event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEntity {
    pub target_id: String,
    pub ad_group_id: String,
    pub campaign_id: String,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub bid: Option<f64>,
}

/// Traffic metric fact (impressions/clicks/cost for one window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficFact {
    pub idempotency_id: String,
    pub time_window_start: String,
    pub campaign_id: String,
    #[serde(default)]
    pub ad_group_id: Option<String>,
    #[serde(default)]
    pub impressions: i64,
    #[serde(default)]
    pub clicks: i64,
    #[serde(default)]
    pub cost: f64,
}

/// Conversion metric fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionFact {
    pub idempotency_id: String,
    pub time_window_start: String,
    pub campaign_id: String,
    #[serde(default)]
    pub ad_group_id: Option<String>,
    #[serde(default)]
    pub conversions: i64,
    #[serde(default)]
    pub sales: f64,
}

/// Budget consumption fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetUsageFact {
    pub idempotency_id: String,
    pub budget_scope_id: String,
    #[serde(default)]
    pub usage_percent: f64,
    pub usage_updated_at: String,
}
