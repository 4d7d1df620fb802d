//! Local file tree handling

pub mod content_map;

pub use content_map::{content_hash, ContentMap, FileEntry};
