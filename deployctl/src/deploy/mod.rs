//! Deployment module

pub mod api;
pub mod events;
pub mod fsm;
pub mod inspect;
pub mod outcome;
pub mod process;
pub mod stream;

pub use events::DeploymentEvent;
pub use outcome::DeploymentOutcome;
pub use process::{process_deployment, DeployContext, LinkRecorder};
pub use stream::{DeploymentEventStream, DeploymentRequest};
