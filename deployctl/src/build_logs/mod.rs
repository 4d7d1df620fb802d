//! Build log streaming

pub mod follower;
pub mod printer;
pub mod subscriber;

pub use follower::{LogFollower, OnLogEntry};
pub use subscriber::{BuildLogSubscriber, LogSubscription};
