//! Report dataset repository.
//!
//! Single-row upserts with last-write-wins semantics. The `refreshing`
//! flag is an advisory lease set and cleared by the refresh orchestrator;
//! nothing here enforces exclusivity at the database level.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::{parse_datetime, parse_datetime_opt};
use crate::models::{
    Aggregation, EntityKind, ReportDataset, ReportDatasetKey, ReportStatus,
};
use crate::schema::report_datasets;

/// Raw report dataset row.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = report_datasets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct ReportDatasetRow {
    #[allow(dead_code)]
    id: String,
    account_id: String,
    country_code: String,
    bucket_start: String,
    aggregation: String,
    entity_kind: String,
    report_id: Option<String>,
    status: String,
    last_report_created_at: Option<String>,
    refreshing: i32,
    error: Option<String>,
    next_refresh_at: Option<String>,
    updated_at: String,
}

impl From<ReportDatasetRow> for ReportDataset {
    fn from(row: ReportDatasetRow) -> Self {
        ReportDataset {
            key: ReportDatasetKey {
                account_id: row.account_id,
                country_code: row.country_code,
                bucket_start: parse_datetime(&row.bucket_start),
                aggregation: Aggregation::from_str(&row.aggregation)
                    .unwrap_or(Aggregation::Daily),
                entity_kind: EntityKind::from_str(&row.entity_kind)
                    .unwrap_or(EntityKind::Target),
            },
            report_id: row.report_id,
            status: ReportStatus::from_str(&row.status).unwrap_or(ReportStatus::Missing),
            last_report_created_at: parse_datetime_opt(row.last_report_created_at),
            refreshing: row.refreshing != 0,
            error: row.error,
            next_refresh_at: parse_datetime_opt(row.next_refresh_at),
            updated_at: parse_datetime(&row.updated_at),
        }
    }
}

/// Repository for report-dataset metadata rows.
#[derive(Clone)]
pub struct ReportDatasetRepository {
    pool: AsyncSqlitePool,
}

impl ReportDatasetRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Get the row for a key, if one exists.
    pub async fn get(&self, key: &ReportDatasetKey) -> Result<Option<ReportDataset>, DieselError> {
        let mut conn = self.pool.get().await?;

        report_datasets::table
            .find(key.row_id())
            .first::<ReportDatasetRow>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(ReportDataset::from))
    }

    /// Create the row for a key if it does not exist yet (status `missing`).
    ///
    /// Used by the bucket-scanning collaborator when a new time bucket
    /// opens, and by manual refresh triggers.
    pub async fn ensure_row(&self, key: &ReportDatasetKey) -> Result<ReportDataset, DieselError> {
        if let Some(existing) = self.get(key).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let mut conn = self.pool.get().await?;
        diesel::insert_into(report_datasets::table)
            .values((
                report_datasets::id.eq(key.row_id()),
                report_datasets::account_id.eq(&key.account_id),
                report_datasets::country_code.eq(&key.country_code),
                report_datasets::bucket_start.eq(key.bucket_start.to_rfc3339()),
                report_datasets::aggregation.eq(key.aggregation.as_str()),
                report_datasets::entity_kind.eq(key.entity_kind.as_str()),
                report_datasets::status.eq(ReportStatus::Missing.as_str()),
                report_datasets::refreshing.eq(0),
                report_datasets::updated_at.eq(now.to_rfc3339()),
            ))
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(ReportDataset {
            key: key.clone(),
            report_id: None,
            status: ReportStatus::Missing,
            last_report_created_at: None,
            refreshing: false,
            error: None,
            next_refresh_at: None,
            updated_at: now,
        })
    }

    /// Set or clear the advisory refreshing lease.
    pub async fn set_refreshing(
        &self,
        key: &ReportDatasetKey,
        refreshing: bool,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(report_datasets::table.find(key.row_id()))
            .set((
                report_datasets::refreshing.eq(refreshing as i32),
                report_datasets::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Set the lifecycle status without touching error or report id.
    pub async fn set_status(
        &self,
        key: &ReportDatasetKey,
        status: ReportStatus,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(report_datasets::table.find(key.row_id()))
            .set((
                report_datasets::status.eq(status.as_str()),
                report_datasets::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Record a newly created report: persist its id and creation time and
    /// move the row to `fetching`.
    pub async fn record_report_created(
        &self,
        key: &ReportDatasetKey,
        report_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(report_datasets::table.find(key.row_id()))
            .set((
                report_datasets::report_id.eq(report_id),
                report_datasets::status.eq(ReportStatus::Fetching.as_str()),
                report_datasets::last_report_created_at.eq(created_at.to_rfc3339()),
                report_datasets::error.eq(None::<String>),
                report_datasets::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Mark the row completed and clear any recorded error.
    pub async fn mark_completed(&self, key: &ReportDatasetKey) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(report_datasets::table.find(key.row_id()))
            .set((
                report_datasets::status.eq(ReportStatus::Completed.as_str()),
                report_datasets::error.eq(None::<String>),
                report_datasets::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Record a failed refresh. Leaves `report_id` untouched so a later
    /// cycle can decide whether to retry against the same report.
    pub async fn record_failure(
        &self,
        key: &ReportDatasetKey,
        message: &str,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(report_datasets::table.find(key.row_id()))
            .set((
                report_datasets::status.eq(ReportStatus::Failed.as_str()),
                report_datasets::error.eq(message),
                report_datasets::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Count rows grouped by status, for operator-facing status output.
    pub async fn status_counts(&self) -> Result<Vec<(String, i64)>, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;
        report_datasets::table
            .group_by(report_datasets::status)
            .select((report_datasets::status, count_star()))
            .load::<(String, i64)>(&mut conn)
            .await
    }
}
