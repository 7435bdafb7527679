//! Control record repository.
//!
//! The control table holds a single row (id "main") that the worker reads
//! at the top of every poll cycle. The first reader lazily creates it.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::parse_datetime;
use crate::models::{ControlRecord, CONTROL_ID};
use crate::schema::control;

/// Raw control row.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = control)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct ControlRow {
    #[allow(dead_code)]
    id: String,
    enabled: i32,
    messages_per_second: i32,
    updated_at: String,
}

impl From<ControlRow> for ControlRecord {
    fn from(row: ControlRow) -> Self {
        ControlRecord {
            enabled: row.enabled != 0,
            messages_per_second: row.messages_per_second.max(0) as u32,
            updated_at: parse_datetime(&row.updated_at),
        }
    }
}

/// Repository for the singleton worker control record.
#[derive(Clone)]
pub struct ControlRepository {
    pool: AsyncSqlitePool,
}

impl ControlRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Read the control record, creating the default (enabled, unlimited)
    /// row on first access.
    pub async fn get_or_init(&self) -> Result<ControlRecord, DieselError> {
        let mut conn = self.pool.get().await?;

        let existing = control::table
            .find(CONTROL_ID)
            .first::<ControlRow>(&mut conn)
            .await
            .optional()?;

        if let Some(row) = existing {
            return Ok(row.into());
        }

        let record = ControlRecord::default();
        diesel::insert_into(control::table)
            .values((
                control::id.eq(CONTROL_ID),
                control::enabled.eq(record.enabled as i32),
                control::messages_per_second.eq(record.messages_per_second as i32),
                control::updated_at.eq(record.updated_at.to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(record)
    }

    /// Enable or disable the ingestion worker.
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), DieselError> {
        // Ensure the row exists before updating it
        self.get_or_init().await?;

        let mut conn = self.pool.get().await?;
        diesel::update(control::table.find(CONTROL_ID))
            .set((
                control::enabled.eq(enabled as i32),
                control::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Set the worker's message rate (0 = unlimited).
    pub async fn set_rate(&self, messages_per_second: u32) -> Result<(), DieselError> {
        self.get_or_init().await?;

        let mut conn = self.pool.get().await?;
        diesel::update(control::table.find(CONTROL_ID))
            .set((
                control::messages_per_second.eq(messages_per_second as i32),
                control::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testutil::test_pool;

    #[tokio::test]
    async fn test_lazy_init_creates_enabled_unlimited() {
        let (pool, _dir) = test_pool().await;
        let repo = ControlRepository::new(pool);

        let record = repo.get_or_init().await.unwrap();
        assert!(record.enabled);
        assert_eq!(record.messages_per_second, 0);

        // Second read returns the persisted row, not a fresh default
        let again = repo.get_or_init().await.unwrap();
        assert_eq!(again.updated_at, record.updated_at);
    }

    #[tokio::test]
    async fn test_set_enabled_roundtrip() {
        let (pool, _dir) = test_pool().await;
        let repo = ControlRepository::new(pool);

        repo.set_enabled(false).await.unwrap();
        assert!(!repo.get_or_init().await.unwrap().enabled);

        repo.set_enabled(true).await.unwrap();
        assert!(repo.get_or_init().await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_set_rate() {
        let (pool, _dir) = test_pool().await;
        let repo = ControlRepository::new(pool);

        repo.set_rate(25).await.unwrap();
        assert_eq!(repo.get_or_init().await.unwrap().messages_per_second, 25);
    }
}
