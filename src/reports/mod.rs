//! Report provider boundary and refresh decision logic.
//!
//! The external reporting API is reached through [`ReportProvider`];
//! [`state::decide`] is the pure function that picks the next action for
//! a dataset row.

mod http;
pub mod state;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ReportDatasetKey;

pub use http::HttpReportProvider;
pub use state::{decide, RefreshAction};

/// Provider-side status of a requested report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportJobStatus {
    /// Still being generated; nothing to do this cycle.
    InProgress,
    /// Finished; a download may be available.
    Success,
    /// Failed or expired; treat as if no report existed.
    Failure,
}

impl ReportJobStatus {
    /// Map the provider's status strings onto the three cases we act on.
    /// Unrecognized values are treated as still-in-progress rather than
    /// failed, so a new provider status never triggers spurious re-creates.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" | "COMPLETED" => Self::Success,
            "FAILURE" | "FAILED" | "EXPIRED" | "CANCELLED" => Self::Failure,
            _ => Self::InProgress,
        }
    }
}

/// Live status probe for a report id.
#[derive(Debug, Clone)]
pub struct StatusProbe {
    pub status: ReportJobStatus,
    pub download_url: Option<String>,
}

/// External reporting API: create, poll, fetch-and-parse.
///
/// Implementations must bound every call with a timeout; an unbounded
/// hang on one key must not starve concurrently processed refreshes.
#[async_trait]
pub trait ReportProvider: Send + Sync {
    /// Request a new report for the key. Returns the provider's report id.
    async fn create_report(&self, key: &ReportDatasetKey) -> Result<String>;

    /// Fetch the current status of a previously created report.
    async fn report_status(&self, report_id: &str) -> Result<StatusProbe>;

    /// Download a finished report and parse it. Returns the row count.
    async fn download_and_parse(&self, download_url: &str, key: &ReportDatasetKey) -> Result<u64>;
}
