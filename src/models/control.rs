//! Worker control record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed id of the singleton control row.
pub const CONTROL_ID: &str = "main";

/// Singleton record controlling the ingestion worker.
///
/// Read at the top of every poll cycle; mutated only by the explicit
/// start/stop/speed operations. `messages_per_second = 0` means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRecord {
    pub enabled: bool,
    pub messages_per_second: u32,
    pub updated_at: DateTime<Utc>,
}

impl Default for ControlRecord {
    fn default() -> Self {
        Self {
            enabled: true,
            messages_per_second: 0,
            updated_at: Utc::now(),
        }
    }
}
