//! Database migrations using diesel_migrations.
//!
//! Embeds migrations at compile time and runs them in a blocking task to
//! work with async connections.

use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use super::pool::DieselError;
use super::util::to_diesel_error;

pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Run pending migrations for a database URL.
///
/// Creates a sync connection and runs migrations in a blocking task.
pub async fn run_migrations(database_url: &str) -> Result<(), DieselError> {
    // Strip sqlite: prefix if present - diesel expects just the file path
    let url = database_url
        .strip_prefix("sqlite:")
        .unwrap_or(database_url)
        .to_string();

    tokio::task::spawn_blocking(move || {
        let mut conn = diesel::SqliteConnection::establish(&url).map_err(to_diesel_error)?;

        let applied = conn
            .run_pending_migrations(SQLITE_MIGRATIONS)
            .map_err(|e| to_diesel_error(e.to_string()))?;

        for migration in &applied {
            info!("Applied migration: {}", migration);
        }

        Ok(())
    })
    .await
    .map_err(to_diesel_error)?
}
