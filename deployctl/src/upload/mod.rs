//! Content upload pipeline

pub mod manager;
pub mod progress;

pub use manager::{UploadEvent, UploadManager, UploadOptions, UploadRun, UploadedFile};
pub use progress::{ByteCounter, ProgressMode, ProgressSample};
