//! amstream - advertising stream ingestion and report dataset refresh.
//!
//! Ingests advertising-entity change events from an SQS queue and keeps
//! periodic report-dataset rows current by driving an external reporting
//! API through a create/poll/fetch/parse lifecycle.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod ratelimit;
pub mod reports;
pub mod repository;
pub mod schema;
pub mod services;
