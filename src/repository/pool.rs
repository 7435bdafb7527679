//! SQLite connection handling.
//!
//! diesel-async has no native SQLite driver; connections go through
//! SyncConnectionWrapper, which moves blocking diesel calls onto the
//! runtime's blocking pool. File-backed SQLite connections are cheap to
//! open, so each repository call gets a fresh connection rather than a
//! handle from a pooled set.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::AsyncConnection;

/// Diesel error type alias.
pub type DieselError = diesel::result::Error;

/// Async SQLite connection type used throughout the repositories.
pub type AsyncSqliteConnection = SyncConnectionWrapper<SqliteConnection>;

/// Connection factory for one database file, shared by every repository.
#[derive(Clone)]
pub struct AsyncSqlitePool {
    database_url: String,
}

impl AsyncSqlitePool {
    /// Build a factory from a database URL. A `sqlite:` scheme prefix is
    /// tolerated and stripped; diesel wants the bare file path.
    pub fn new(database_url: &str) -> Self {
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    /// Build a factory for a database file path.
    pub fn from_path(db_path: &Path) -> Self {
        Self::new(&db_path.display().to_string())
    }

    /// Open a fresh connection.
    pub async fn get(&self) -> Result<AsyncSqliteConnection, DieselError> {
        AsyncSqliteConnection::establish(&self.database_url)
            .await
            .map_err(super::util::to_diesel_error)
    }

    /// The resolved database URL (bare file path).
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}
