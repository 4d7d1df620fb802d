//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::file::File;

/// Overrides the base directory
pub const HOME_ENV: &str = "DEPLOYCTL_HOME";

/// Storage layout for the client
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the default logs directory
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        if let Some(home) = std::env::var_os(HOME_ENV) {
            return Self::new(home);
        }
        let base_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".deployctl");
        Self::new(base_dir)
    }
}
