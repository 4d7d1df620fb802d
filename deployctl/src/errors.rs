//! Error types for deployctl

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the deployment client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Cannot read {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload of {hash} failed: {source}")]
    Upload {
        hash: String,
        #[source]
        source: Box<ClientError>,
    },

    #[error("API error ({status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Deployment failed ({code}): {message}")]
    Deployment { code: String, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Log stream error: {0}")]
    LogStream(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClientError::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub fn upload(hash: impl Into<String>, cause: ClientError) -> Self {
        ClientError::Upload {
            hash: hash.into(),
            source: Box::new(cause),
        }
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClientError::Internal(err.to_string())
    }
}
