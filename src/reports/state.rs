//! Refresh decision function.
//!
//! Pure: same row, probe, and clock always produce the same action, so
//! the full decision table is unit-testable without any I/O.

use chrono::{DateTime, Utc};

use super::{ReportJobStatus, StatusProbe};
use crate::models::ReportDataset;

/// The next action for a report dataset row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshAction {
    /// Nothing to do this cycle.
    None,
    /// A finished report is ready to download and parse.
    Process { download_url: String },
    /// No usable report exists; request a new one.
    Create,
}

/// Decide what a refresh cycle should do for `row`.
///
/// `probe` is the live provider status for `row.report_id` and is only
/// meaningful when that id is set; callers skip the probe otherwise.
///
/// An open bucket always decides `None`, regardless of report state:
/// reports are never requested for a window that has not fully elapsed.
pub fn decide(
    row: &ReportDataset,
    probe: Option<&StatusProbe>,
    now: DateTime<Utc>,
) -> RefreshAction {
    if !row.bucket_closed(now) {
        return RefreshAction::None;
    }

    let Some(_report_id) = &row.report_id else {
        return RefreshAction::Create;
    };

    let Some(probe) = probe else {
        // A report id without a probe means the status fetch was skipped;
        // do nothing rather than guess
        return RefreshAction::None;
    };

    match probe.status {
        ReportJobStatus::Failure => RefreshAction::Create,
        ReportJobStatus::Success => match &probe.download_url {
            Some(url) => RefreshAction::Process {
                download_url: url.clone(),
            },
            // Finished but the download is not published yet; wait
            None => RefreshAction::None,
        },
        ReportJobStatus::InProgress => RefreshAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Aggregation, EntityKind, ReportDatasetKey, ReportStatus};

    const BUCKET: &str = "2026-08-01T00:00:00Z";
    const MID_WINDOW: &str = "2026-08-01T12:00:00Z";
    const AFTER_WINDOW: &str = "2026-08-03T00:00:00Z";

    fn row(report_id: Option<&str>) -> ReportDataset {
        ReportDataset {
            key: ReportDatasetKey {
                account_id: "ENTITY1".to_string(),
                country_code: "US".to_string(),
                bucket_start: BUCKET.parse().unwrap(),
                aggregation: Aggregation::Daily,
                entity_kind: EntityKind::Target,
            },
            report_id: report_id.map(|id| id.to_string()),
            status: ReportStatus::Missing,
            last_report_created_at: None,
            refreshing: false,
            error: None,
            next_refresh_at: None,
            updated_at: Utc::now(),
        }
    }

    fn probe(status: ReportJobStatus, url: Option<&str>) -> StatusProbe {
        StatusProbe {
            status,
            download_url: url.map(|u| u.to_string()),
        }
    }

    #[test]
    fn test_open_bucket_always_none() {
        let now = MID_WINDOW.parse().unwrap();
        assert_eq!(decide(&row(None), None, now), RefreshAction::None);
        // Tie-break wins even over a finished report
        let finished = probe(ReportJobStatus::Success, Some("https://dl/1"));
        assert_eq!(
            decide(&row(Some("R1")), Some(&finished), now),
            RefreshAction::None
        );
    }

    #[test]
    fn test_closed_bucket_without_report_creates() {
        let now = AFTER_WINDOW.parse().unwrap();
        assert_eq!(decide(&row(None), None, now), RefreshAction::Create);
    }

    #[test]
    fn test_failed_report_treated_as_missing() {
        let now = AFTER_WINDOW.parse().unwrap();
        let failed = probe(ReportJobStatus::Failure, None);
        assert_eq!(
            decide(&row(Some("R1")), Some(&failed), now),
            RefreshAction::Create
        );
    }

    #[test]
    fn test_success_with_download_processes() {
        let now = AFTER_WINDOW.parse().unwrap();
        let ready = probe(ReportJobStatus::Success, Some("https://dl/report.json"));
        assert_eq!(
            decide(&row(Some("R1")), Some(&ready), now),
            RefreshAction::Process {
                download_url: "https://dl/report.json".to_string()
            }
        );
    }

    #[test]
    fn test_success_without_download_waits() {
        let now = AFTER_WINDOW.parse().unwrap();
        let no_url = probe(ReportJobStatus::Success, None);
        assert_eq!(
            decide(&row(Some("R1")), Some(&no_url), now),
            RefreshAction::None
        );
    }

    #[test]
    fn test_in_progress_is_none() {
        let now = AFTER_WINDOW.parse().unwrap();
        let pending = probe(ReportJobStatus::InProgress, None);
        assert_eq!(
            decide(&row(Some("R1")), Some(&pending), now),
            RefreshAction::None
        );
    }

    #[test]
    fn test_report_id_without_probe_is_none() {
        let now = AFTER_WINDOW.parse().unwrap();
        assert_eq!(decide(&row(Some("R1")), None, now), RefreshAction::None);
    }

    #[test]
    fn test_is_referentially_transparent() {
        let now = AFTER_WINDOW.parse().unwrap();
        let pending = probe(ReportJobStatus::InProgress, None);
        let subject = row(Some("R1"));
        let first = decide(&subject, Some(&pending), now);
        let second = decide(&subject, Some(&pending), now);
        assert_eq!(first, second);
    }

    /// Lifecycle from the worked scenario: create, then wait while the
    /// provider generates, then process once the download is published.
    #[test]
    fn test_create_then_poll_then_process_chain() {
        let now = AFTER_WINDOW.parse().unwrap();

        let fresh = row(None);
        assert_eq!(decide(&fresh, None, now), RefreshAction::Create);

        let requested = row(Some("R1"));
        let pending = probe(ReportJobStatus::InProgress, None);
        assert_eq!(
            decide(&requested, Some(&pending), now),
            RefreshAction::None
        );

        let ready = probe(ReportJobStatus::Success, Some("https://dl/r1"));
        assert_eq!(
            decide(&requested, Some(&ready), now),
            RefreshAction::Process {
                download_url: "https://dl/r1".to_string()
            }
        );
    }
}
