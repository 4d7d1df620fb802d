//! Application configuration options

use std::time::Duration;

use crate::storage::settings::Settings;
use crate::upload::manager::{UploadOptions, DEFAULT_CONCURRENCY};
use crate::upload::progress::ProgressMode;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Remote API configuration
    pub api: ApiOptions,

    /// Deployment attempt configuration
    pub process: ProcessOptions,

    /// Deadline for the whole command
    pub timeout: Option<Duration>,
}

impl AppOptions {
    /// Options derived from the settings file.
    ///
    /// `interactive` selects time-based progress for terminals and quarter
    /// based progress otherwise.
    pub fn from_settings(settings: &Settings, interactive: bool) -> Self {
        let progress = if interactive {
            ProgressMode::Interactive {
                interval: Duration::from_millis(settings.upload.progress_interval_ms),
            }
        } else {
            ProgressMode::Fractional
        };

        Self {
            api: ApiOptions {
                base_url: settings.api.base_url.clone(),
                team_id: settings.api.team_id.clone(),
                request_timeout: Duration::from_secs(settings.api.request_timeout_secs),
            },
            process: ProcessOptions {
                upload: UploadOptions {
                    concurrency: settings.upload.concurrency,
                    progress,
                },
                follow_logs: settings.follow_logs,
            },
            timeout: None,
        }
    }
}

/// Remote API options
#[derive(Debug, Clone)]
pub struct ApiOptions {
    /// Base URL, without trailing slash
    pub base_url: String,

    /// Team scope added to every request
    pub team_id: Option<String>,

    /// Timeout of non-streaming requests
    pub request_timeout: Duration,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            base_url: "https://api.deployctl.dev".to_string(),
            team_id: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Options of one deployment attempt
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Upload concurrency and progress policy
    pub upload: UploadOptions,

    /// Stream build logs once the deployment is created
    pub follow_logs: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            upload: UploadOptions {
                concurrency: DEFAULT_CONCURRENCY,
                progress: ProgressMode::default(),
            },
            follow_logs: false,
        }
    }
}
