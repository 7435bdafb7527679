//! Error taxonomy for the ingestion worker and refresh pipeline.
//!
//! The distinction that matters operationally is transient vs. terminal:
//! transient infrastructure errors are retried (or simply waited out) by
//! the worker loop, credential errors are fatal at startup, and validation
//! errors block message acknowledgment so the queue redelivers.

use thiserror::Error;

/// Errors surfaced by the core subsystems.
#[derive(Debug, Error)]
pub enum Error {
    /// Queue, network, or database blip. Retry at the caller's discretion.
    #[error("transient infrastructure error: {0}")]
    Transient(String),

    /// Missing or invalid credentials. Fatal at startup.
    #[error("credential error: {0}")]
    Credential(String),

    /// Malformed payload. Blocks acknowledgment so the queue redelivers
    /// and eventually dead-letters the message.
    #[error("invalid payload: {0}")]
    Validation(String),

    /// Report provider failure. Recorded on the dataset row as
    /// `status=failed`; a later refresh re-attempts via a new report.
    #[error("report provider error: {0}")]
    ExternalApi(String),

    /// Internal invariant broken (e.g. a refreshing flag leaked across a
    /// crash). Treated as a warning, not a hard failure.
    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl Error {
    /// Whether the worker loop may simply retry after a short backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Transient("socket closed".into()).is_transient());
        assert!(!Error::Validation("missing campaign_id".into()).is_transient());
        assert!(!Error::Credential("no AWS credentials".into()).is_transient());
    }

    #[test]
    fn test_display_includes_cause() {
        let err = Error::ExternalApi("HTTP 502 from /reports".into());
        assert!(err.to_string().contains("HTTP 502"));
    }
}
