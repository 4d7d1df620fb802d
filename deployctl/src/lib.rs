//! deployctl library
//!
//! Client side of the deployment protocol: hashing a local tree, uploading
//! what the server lacks, following the deployment to its final state and
//! streaming build logs.

pub mod app;
pub mod build_logs;
pub mod deploy;
pub mod errors;
pub mod files;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod status;
pub mod storage;
pub mod upload;
pub mod utils;
