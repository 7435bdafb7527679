//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking,
//! over SQLite via diesel-async's SyncConnectionWrapper.

pub mod control;
pub mod entities;
pub mod migrations;
pub mod pool;
pub mod report_dataset;
pub mod util;

pub use control::ControlRepository;
pub use entities::EntityRepository;
pub use migrations::run_migrations;
pub use pool::{AsyncSqlitePool, DieselError};
pub use report_dataset::ReportDatasetRepository;
pub use util::{parse_datetime, parse_datetime_opt};
