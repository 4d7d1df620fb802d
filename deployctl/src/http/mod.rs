//! HTTP transport of the deployment API

pub mod client;
pub mod deployments;
pub mod files;
pub mod lines;

pub use client::HttpClient;
