//! Report dataset metadata and its key types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Time-bucket aggregation for a report dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Daily,
    Hourly,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Hourly => "hourly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "hourly" => Some(Self::Hourly),
            _ => None,
        }
    }

    /// Length of one bucket window.
    pub fn period(&self) -> Duration {
        match self {
            Self::Daily => Duration::days(1),
            Self::Hourly => Duration::hours(1),
        }
    }
}

/// Entity type a report dataset covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Target,
    Product,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Product => "product",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "target" => Some(Self::Target),
            "product" => Some(Self::Product),
            _ => None,
        }
    }
}

/// Lifecycle status of a report dataset row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// No report has been requested for this bucket yet.
    Missing,
    /// A report was requested and the provider is generating it.
    Fetching,
    /// A finished report is being downloaded and parsed.
    Parsing,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "missing" => Some(Self::Missing),
            "fetching" => Some(Self::Fetching),
            "parsing" => Some(Self::Parsing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Unique key of a report dataset row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDatasetKey {
    pub account_id: String,
    pub country_code: String,
    /// Start of the time bucket this row tracks.
    pub bucket_start: DateTime<Utc>,
    pub aggregation: Aggregation,
    pub entity_kind: EntityKind,
}

impl ReportDatasetKey {
    /// Stable row id derived from the key fields.
    pub fn row_id(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.account_id,
            self.country_code,
            self.bucket_start.to_rfc3339(),
            self.aggregation.as_str(),
            self.entity_kind.as_str()
        )
    }
}

impl std::fmt::Display for ReportDatasetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.row_id())
    }
}

/// One report-dataset row: the persisted refresh state for a single
/// (account, country, bucket, aggregation, entity kind).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDataset {
    pub key: ReportDatasetKey,
    pub report_id: Option<String>,
    pub status: ReportStatus,
    pub last_report_created_at: Option<DateTime<Utc>>,
    /// Advisory single-flight lease, not a hard lock.
    pub refreshing: bool,
    pub error: Option<String>,
    pub next_refresh_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ReportDataset {
    /// Whether the bucket window has fully elapsed at `now`.
    ///
    /// Reports are never requested for a window still in progress.
    pub fn bucket_closed(&self, now: DateTime<Utc>) -> bool {
        self.key.bucket_start + self.key.aggregation.period() <= now
    }
}
