//! Logging configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::errors::ClientError;

/// Crates whose events follow the configured level; everything else stays at `warn`
const OWN_TARGETS: &[&str] = &["deployctl", "deploy_api"];

/// Verbosity of the client's own logs, as written in the settings file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// `EnvFilter` directives scoping this level to the client crates
    pub fn directives(self) -> String {
        let mut directives = vec!["warn".to_string()];
        directives.extend(OWN_TARGETS.iter().map(|t| format!("{}={}", t, self.as_str())));
        directives.join(",")
    }
}

/// Where logs go and how they look
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Ignored when `RUST_LOG` is set
    pub log_level: LogLevel,

    /// Daily rolling JSON file, next to stderr output
    pub log_dir: Option<PathBuf>,

    /// JSON lines on stderr instead of text
    pub json_format: bool,
}

/// Keeps the file writer flushing; drop it last
#[derive(Debug, Default)]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize logging.
///
/// Status output owns stdout, so logs go to stderr and, optionally, to a
/// rolling file.
pub fn init_logging(options: LogOptions) -> Result<LogGuard, ClientError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.directives()));

    let mut layers: Vec<Box<dyn Layer<_> + Send + Sync>> = Vec::new();
    let stderr = fmt::layer().with_writer(std::io::stderr);
    if options.json_format {
        layers.push(stderr.json().boxed());
    } else {
        layers.push(stderr.boxed());
    }

    let mut guard = LogGuard::default();
    if let Some(dir) = &options.log_dir {
        std::fs::create_dir_all(dir).map_err(|e| ClientError::file_system(dir, e))?;
        let appender = tracing_appender::rolling::daily(dir, "deployctl.log");
        let (writer, worker) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
        guard._file = Some(worker);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| ClientError::ConfigError(e.to_string()))?;

    Ok(guard)
}
