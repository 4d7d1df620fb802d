//! Final result of a deployment attempt

use deploy_api::{ApiErrorBody, Deployment, Indication, IndicationKind};

use crate::deploy::fsm::DeploymentPhase;

/// Server error code asking for project settings before the first deploy
pub const MISSING_PROJECT_SETTINGS: &str = "missing_project_settings";

/// Server error code for a forbidden deployment
pub const FORBIDDEN: &str = "forbidden";

/// Advisory message collected during the attempt
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedIndication {
    pub kind: IndicationKind,
    pub indication: Indication,
}

/// How an attempt ended, when it ended in a way the caller can act on.
///
/// Anything else surfaces as a [`crate::errors::ClientError`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentOutcome {
    /// Aliases were assigned
    Ready {
        deployment: Deployment,
        indications: Vec<CollectedIndication>,
    },

    /// The project has to be configured first
    MissingProjectSettings(ApiErrorBody),

    /// The account may not deploy this project
    Forbidden(ApiErrorBody),

    /// Checks concluded as failed
    ChecksFailed(Deployment),

    /// Canceled on the server
    Canceled(Deployment),
}

impl DeploymentOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, DeploymentOutcome::Ready { .. })
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.is_ready() {
            0
        } else {
            1
        }
    }

    pub fn phase(&self) -> DeploymentPhase {
        match self {
            DeploymentOutcome::Ready { .. } => DeploymentPhase::Ready,
            DeploymentOutcome::Canceled(_) => DeploymentPhase::Canceled,
            _ => DeploymentPhase::Error,
        }
    }

    pub fn deployment(&self) -> Option<&Deployment> {
        match self {
            DeploymentOutcome::Ready { deployment, .. } => Some(deployment),
            DeploymentOutcome::ChecksFailed(d) | DeploymentOutcome::Canceled(d) => Some(d),
            _ => None,
        }
    }

    /// Classify a server `error` event; `None` when it should be raised
    pub fn from_error(body: &ApiErrorBody) -> Option<Self> {
        match body.code.as_str() {
            MISSING_PROJECT_SETTINGS => Some(DeploymentOutcome::MissingProjectSettings(body.clone())),
            FORBIDDEN => Some(DeploymentOutcome::Forbidden(body.clone())),
            _ => None,
        }
    }
}
