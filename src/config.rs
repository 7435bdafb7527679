//! Settings loading: TOML file plus environment overrides.
//!
//! Every field has a default except the queue URL, which must be supplied
//! before the worker can start. `.env` files are honored via dotenvy in
//! main before settings load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default settings file name inside the data directory.
pub const SETTINGS_FILE: &str = "amstream.toml";

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_wait_secs() -> u16 {
    10
}

fn default_report_timeout_secs() -> u64 {
    30
}

fn default_idle_backoff_secs() -> u64 {
    2
}

fn default_disabled_poll_secs() -> u64 {
    5
}

fn default_error_backoff_secs() -> u64 {
    1
}

/// Queue connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Full queue URL. Required.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Override endpoint for local development queues.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Long-poll wait per receive call.
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u16,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            region: default_region(),
            endpoint: None,
            wait_secs: default_wait_secs(),
        }
    }
}

/// Report provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Base URL of the reporting API.
    #[serde(default)]
    pub base_url: String,
    /// Call-level timeout; an unbounded hang on one key must not starve
    /// the rest of the pipeline.
    #[serde(default = "default_report_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_report_timeout_secs(),
        }
    }
}

/// Worker loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Sleep after an empty batch, trading latency for fewer API calls.
    #[serde(default = "default_idle_backoff_secs")]
    pub idle_backoff_secs: u64,
    /// Re-check interval while the control record is disabled.
    #[serde(default = "default_disabled_poll_secs")]
    pub disabled_poll_secs: u64,
    /// Backoff after a failed receive call.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            idle_backoff_secs: default_idle_backoff_secs(),
            disabled_poll_secs: default_disabled_poll_secs(),
            error_backoff_secs: default_error_backoff_secs(),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Database file; defaults to `<data_dir>/amstream.sqlite`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub reports: ReportSettings,
    #[serde(default)]
    pub worker: WorkerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_path: None,
            queue: QueueSettings::default(),
            reports: ReportSettings::default(),
            worker: WorkerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from an explicit path, or from `<data_dir>/amstream.toml`
    /// when present, falling back to defaults. Environment variables
    /// override file values.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = default_data_dir().join(SETTINGS_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        let settings = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", path.display(), e))?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("AMSTREAM_QUEUE_URL") {
            self.queue.url = url;
        }
        if let Ok(region) = std::env::var("AMSTREAM_QUEUE_REGION") {
            self.queue.region = region;
        }
        if let Ok(endpoint) = std::env::var("AMSTREAM_QUEUE_ENDPOINT") {
            self.queue.endpoint = Some(endpoint);
        }
        if let Ok(base_url) = std::env::var("AMSTREAM_REPORTS_URL") {
            self.reports.base_url = base_url;
        }
        if let Ok(dir) = std::env::var("AMSTREAM_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }

    /// Resolved database path.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("amstream.sqlite"))
    }
}
