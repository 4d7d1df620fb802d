//! Wire models shared by the deployment client and server.

pub mod models;

pub use models::*;
