//! Core services: payload routing, queue ingestion, report refresh.

pub mod ingest;
pub mod notify;
pub mod refresh;
pub mod router;

pub use ingest::IngestionWorker;
pub use notify::{MetadataChanged, MetadataNotifier};
pub use refresh::RefreshService;
pub use router::PayloadRouter;
