//! Report refresh orchestration.
//!
//! Wraps the pure decision function with side effects: takes the advisory
//! refreshing lease, performs the decided action against the report
//! provider, records status, and always releases the lease on the way
//! out. A lease left set across a crash permanently blocks its key, so
//! release happens on every exit path, including unexpected errors.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::notify::MetadataNotifier;
use crate::error::{Error, Result};
use crate::models::{ReportDatasetKey, ReportStatus};
use crate::reports::{decide, RefreshAction, ReportProvider, StatusProbe};
use crate::repository::ReportDatasetRepository;

/// Drives one decide-and-act refresh cycle per call.
#[derive(Clone)]
pub struct RefreshService {
    datasets: ReportDatasetRepository,
    provider: Arc<dyn ReportProvider>,
    notifier: MetadataNotifier,
}

impl RefreshService {
    pub fn new(
        datasets: ReportDatasetRepository,
        provider: Arc<dyn ReportProvider>,
        notifier: MetadataNotifier,
    ) -> Self {
        Self {
            datasets,
            provider,
            notifier,
        }
    }

    /// Refresh one key. Idempotent to call repeatedly; each call is a
    /// fresh decide-and-act cycle.
    pub async fn refresh(&self, key: &ReportDatasetKey) -> Result<()> {
        let Some(row) = self.datasets.get(key).await? else {
            // The bucket may have been pruned since the request was queued
            debug!(key = %key, "no dataset row, nothing to refresh");
            return Ok(());
        };

        if row.refreshing {
            // Advisory only: a crash may have leaked the lease, so it is
            // informational, not authoritative
            let leak = Error::Invariant(format!("lease already held for {}", key));
            warn!(key = %key, "{}, proceeding anyway", leak);
        }

        self.datasets.set_refreshing(key, true).await?;
        self.notifier.notify(key);

        let outcome = self.run_cycle(key).await;

        if let Err(err) = &outcome {
            if let Err(record_err) = self.datasets.record_failure(key, &err.to_string()).await {
                warn!(key = %key, "failed to record refresh failure: {}", record_err);
            }
        }

        // Lease release must survive every outcome above
        if let Err(err) = self.datasets.set_refreshing(key, false).await {
            warn!(key = %key, "failed to release refreshing lease: {}", err);
        }
        self.notifier.notify(key);

        outcome
    }

    async fn run_cycle(&self, key: &ReportDatasetKey) -> Result<()> {
        // Re-read after taking the lease; another refresh may have moved
        // the row since the first read
        let Some(row) = self.datasets.get(key).await? else {
            return Ok(());
        };

        let probe: Option<StatusProbe> = match &row.report_id {
            Some(report_id) => Some(self.provider.report_status(report_id).await?),
            None => None,
        };

        match decide(&row, probe.as_ref(), Utc::now()) {
            RefreshAction::None => {
                debug!(key = %key, "nothing to do");
                Ok(())
            }
            RefreshAction::Process { download_url } => {
                self.datasets.set_status(key, ReportStatus::Parsing).await?;
                self.notifier.notify(key);

                let rows = self.provider.download_and_parse(&download_url, key).await?;
                self.datasets.mark_completed(key).await?;
                self.notifier.notify(key);
                info!(key = %key, rows = rows, "report parsed");
                Ok(())
            }
            RefreshAction::Create => {
                let report_id = self.provider.create_report(key).await?;
                if report_id.is_empty() {
                    return Err(Error::ExternalApi(
                        "provider returned no report id".into(),
                    ));
                }

                self.datasets
                    .record_report_created(key, &report_id, Utc::now())
                    .await?;
                self.notifier.notify(key);
                info!(key = %key, report_id = %report_id, "report requested");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Aggregation, EntityKind};
    use crate::reports::ReportJobStatus;
    use crate::repository::testutil::test_pool;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted provider: each operation either succeeds with the
    /// programmed value or fails when the corresponding flag is set.
    #[derive(Default)]
    struct ScriptedProvider {
        report_id: Option<String>,
        status: Option<(ReportJobStatus, Option<String>)>,
        fail_create: bool,
        fail_status: bool,
        fail_download: bool,
        create_calls: Mutex<u32>,
    }

    #[async_trait]
    impl ReportProvider for ScriptedProvider {
        async fn create_report(&self, _key: &ReportDatasetKey) -> Result<String> {
            *self.create_calls.lock().unwrap() += 1;
            if self.fail_create {
                return Err(Error::ExternalApi("create blew up".into()));
            }
            Ok(self.report_id.clone().unwrap_or_default())
        }

        async fn report_status(&self, _report_id: &str) -> Result<StatusProbe> {
            if self.fail_status {
                return Err(Error::ExternalApi("status blew up".into()));
            }
            let (status, download_url) = self
                .status
                .clone()
                .unwrap_or((ReportJobStatus::InProgress, None));
            Ok(StatusProbe {
                status,
                download_url,
            })
        }

        async fn download_and_parse(
            &self,
            _download_url: &str,
            _key: &ReportDatasetKey,
        ) -> Result<u64> {
            if self.fail_download {
                return Err(Error::ExternalApi("download blew up".into()));
            }
            Ok(7)
        }
    }

    fn closed_bucket_key() -> ReportDatasetKey {
        ReportDatasetKey {
            account_id: "ENTITY1".to_string(),
            country_code: "US".to_string(),
            // Far in the past: the bucket is closed
            bucket_start: "2020-01-01T00:00:00Z".parse().unwrap(),
            aggregation: Aggregation::Daily,
            entity_kind: EntityKind::Target,
        }
    }

    fn open_bucket_key() -> ReportDatasetKey {
        ReportDatasetKey {
            account_id: "ENTITY1".to_string(),
            country_code: "US".to_string(),
            bucket_start: Utc::now(),
            aggregation: Aggregation::Daily,
            entity_kind: EntityKind::Target,
        }
    }

    async fn service(
        provider: ScriptedProvider,
    ) -> (RefreshService, ReportDatasetRepository, tempfile::TempDir) {
        let (pool, dir) = test_pool().await;
        let datasets = ReportDatasetRepository::new(pool);
        let service = RefreshService::new(
            datasets.clone(),
            Arc::new(provider),
            MetadataNotifier::disabled(),
        );
        (service, datasets, dir)
    }

    #[tokio::test]
    async fn test_missing_row_is_noop() {
        let (service, _datasets, _dir) = service(ScriptedProvider::default()).await;
        service.refresh(&closed_bucket_key()).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_bucket_is_noop_and_releases_lease() {
        let (service, datasets, _dir) = service(ScriptedProvider::default()).await;
        let key = open_bucket_key();
        datasets.ensure_row(&key).await.unwrap();

        service.refresh(&key).await.unwrap();

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert!(!row.refreshing);
        assert_eq!(row.status, ReportStatus::Missing);
        assert_eq!(row.report_id, None);
    }

    #[tokio::test]
    async fn test_create_persists_report_id() {
        let provider = ScriptedProvider {
            report_id: Some("R1".to_string()),
            ..Default::default()
        };
        let (service, datasets, _dir) = service(provider).await;
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();

        service.refresh(&key).await.unwrap();

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert_eq!(row.report_id.as_deref(), Some("R1"));
        assert_eq!(row.status, ReportStatus::Fetching);
        assert!(row.last_report_created_at.is_some());
        assert!(!row.refreshing);
    }

    #[tokio::test]
    async fn test_create_failure_records_and_releases_lease() {
        let provider = ScriptedProvider {
            fail_create: true,
            ..Default::default()
        };
        let (service, datasets, _dir) = service(provider).await;
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();

        let err = service.refresh(&key).await.unwrap_err();
        assert!(matches!(err, Error::ExternalApi(_)));

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert_eq!(row.status, ReportStatus::Failed);
        assert!(row.error.as_deref().unwrap().contains("create blew up"));
        assert_eq!(row.report_id, None);
        assert!(!row.refreshing);
    }

    #[tokio::test]
    async fn test_empty_report_id_is_failure() {
        let provider = ScriptedProvider {
            report_id: Some(String::new()),
            ..Default::default()
        };
        let (service, datasets, _dir) = service(provider).await;
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();

        let err = service.refresh(&key).await.unwrap_err();
        assert!(err.to_string().contains("no report id"));

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert_eq!(row.report_id, None);
        assert!(!row.refreshing);
    }

    #[tokio::test]
    async fn test_in_progress_report_is_noop() {
        let provider = ScriptedProvider {
            status: Some((ReportJobStatus::InProgress, None)),
            ..Default::default()
        };
        let (service, datasets, _dir) = service(provider).await;
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();
        datasets
            .record_report_created(&key, "R1", Utc::now())
            .await
            .unwrap();

        service.refresh(&key).await.unwrap();

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert_eq!(row.status, ReportStatus::Fetching);
        assert!(!row.refreshing);
    }

    #[tokio::test]
    async fn test_successful_download_completes_row() {
        let provider = ScriptedProvider {
            status: Some((
                ReportJobStatus::Success,
                Some("https://dl/r1".to_string()),
            )),
            ..Default::default()
        };
        let (service, datasets, _dir) = service(provider).await;
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();
        datasets
            .record_report_created(&key, "R1", Utc::now())
            .await
            .unwrap();

        service.refresh(&key).await.unwrap();

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert_eq!(row.status, ReportStatus::Completed);
        assert_eq!(row.error, None);
        assert!(!row.refreshing);
    }

    #[tokio::test]
    async fn test_download_failure_records_and_releases_lease() {
        let provider = ScriptedProvider {
            status: Some((
                ReportJobStatus::Success,
                Some("https://dl/r1".to_string()),
            )),
            fail_download: true,
            ..Default::default()
        };
        let (service, datasets, _dir) = service(provider).await;
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();
        datasets
            .record_report_created(&key, "R1", Utc::now())
            .await
            .unwrap();

        let err = service.refresh(&key).await.unwrap_err();
        assert!(matches!(err, Error::ExternalApi(_)));

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert_eq!(row.status, ReportStatus::Failed);
        assert!(row.error.as_deref().unwrap().contains("download blew up"));
        assert!(!row.refreshing);
    }

    #[tokio::test]
    async fn test_status_probe_failure_releases_lease() {
        let provider = ScriptedProvider {
            fail_status: true,
            ..Default::default()
        };
        let (service, datasets, _dir) = service(provider).await;
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();
        datasets
            .record_report_created(&key, "R1", Utc::now())
            .await
            .unwrap();

        service.refresh(&key).await.unwrap_err();

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert!(!row.refreshing);
        assert_eq!(row.status, ReportStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_report_triggers_recreate() {
        let provider = ScriptedProvider {
            report_id: Some("R2".to_string()),
            status: Some((ReportJobStatus::Failure, None)),
            ..Default::default()
        };
        let (service, datasets, _dir) = service(provider).await;
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();
        datasets
            .record_report_created(&key, "R1", Utc::now())
            .await
            .unwrap();

        service.refresh(&key).await.unwrap();

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert_eq!(row.report_id.as_deref(), Some("R2"));
        assert_eq!(row.status, ReportStatus::Fetching);
        assert!(!row.refreshing);
    }

    /// Provider whose status probe tears the table out from under the
    /// service, so every store write after the probe fails.
    struct TableDroppingProvider {
        pool: crate::repository::AsyncSqlitePool,
    }

    #[async_trait]
    impl ReportProvider for TableDroppingProvider {
        async fn create_report(&self, _key: &ReportDatasetKey) -> Result<String> {
            unreachable!("probe decides before any create")
        }

        async fn report_status(&self, _report_id: &str) -> Result<StatusProbe> {
            use diesel_async::RunQueryDsl;
            let mut conn = self.pool.get().await?;
            diesel::sql_query("DROP TABLE report_datasets")
                .execute(&mut conn)
                .await?;
            Ok(StatusProbe {
                status: ReportJobStatus::InProgress,
                download_url: None,
            })
        }

        async fn download_and_parse(
            &self,
            _download_url: &str,
            _key: &ReportDatasetKey,
        ) -> Result<u64> {
            unreachable!("in-progress reports are never downloaded")
        }
    }

    #[tokio::test]
    async fn test_release_failure_does_not_mask_a_clean_cycle() {
        let (pool, _dir) = test_pool().await;
        let datasets = ReportDatasetRepository::new(pool.clone());
        let service = RefreshService::new(
            datasets.clone(),
            Arc::new(TableDroppingProvider { pool }),
            MetadataNotifier::disabled(),
        );
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();
        datasets
            .record_report_created(&key, "R1", Utc::now())
            .await
            .unwrap();

        // The probe reports in-progress so the cycle decides to do
        // nothing; the lease release then fails against the dropped
        // table and is logged, not surfaced
        service.refresh(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_leaked_lease_is_advisory() {
        let provider = ScriptedProvider {
            report_id: Some("R1".to_string()),
            ..Default::default()
        };
        let (service, datasets, _dir) = service(provider).await;
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();
        // Simulate a crash that left the lease set
        datasets.set_refreshing(&key, true).await.unwrap();

        service.refresh(&key).await.unwrap();

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert_eq!(row.report_id.as_deref(), Some("R1"));
        assert!(!row.refreshing);
    }

    #[tokio::test]
    async fn test_repeated_refresh_is_idempotent() {
        let provider = ScriptedProvider {
            report_id: Some("R1".to_string()),
            status: Some((ReportJobStatus::InProgress, None)),
            ..Default::default()
        };
        let (service, datasets, _dir) = service(provider).await;
        let key = closed_bucket_key();
        datasets.ensure_row(&key).await.unwrap();

        // First call creates; subsequent calls see in-progress and no-op
        service.refresh(&key).await.unwrap();
        service.refresh(&key).await.unwrap();
        service.refresh(&key).await.unwrap();

        let row = datasets.get(&key).await.unwrap().unwrap();
        assert_eq!(row.report_id.as_deref(), Some("R1"));
        assert!(!row.refreshing);
    }
}
