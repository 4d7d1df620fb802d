//! Settings file management

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ClientError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Directory of the rolling log file; stderr only when absent
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Remote API configuration
    #[serde(default)]
    pub api: ApiSettings,

    /// Upload configuration
    #[serde(default)]
    pub upload: UploadSettings,

    /// Stream build logs during deployments
    #[serde(default)]
    pub follow_logs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            api: ApiSettings::default(),
            upload: UploadSettings::default(),
            follow_logs: false,
        }
    }
}

impl Settings {
    /// Read `file`, falling back to defaults when it does not exist
    pub async fn load(file: &File) -> Result<Self, ClientError> {
        if !file.exists().await {
            debug!("No settings file at {}, using defaults", file.path().display());
            return Ok(Self::default());
        }
        file.read_json().await
    }
}

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL for the deployment API
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Team scope of every request
    #[serde(default)]
    pub team_id: Option<String>,

    /// Timeout of non-streaming requests, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.deployctl.dev".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            team_id: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Concurrent uploads
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Cadence of interactive progress updates, in milliseconds
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

fn default_concurrency() -> usize {
    8
}

fn default_progress_interval() -> u64 {
    250
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            progress_interval_ms: default_progress_interval(),
        }
    }
}
