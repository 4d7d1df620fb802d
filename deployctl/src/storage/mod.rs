//! On-disk client state

pub mod layout;
pub mod settings;
