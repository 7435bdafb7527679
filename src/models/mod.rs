//! Domain models.

mod control;
mod entities;
mod report_dataset;

pub use control::{ControlRecord, CONTROL_ID};
pub use entities::{
    Ad, AdGroup, BudgetUsageFact, Campaign, ConversionFact, TargetEntity, TrafficFact,
};
pub use report_dataset::{
    Aggregation, EntityKind, ReportDataset, ReportDatasetKey, ReportStatus,
};
