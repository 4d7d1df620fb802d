//! Events of one deployment attempt, as seen by the orchestrator

use deploy_api::{ApiErrorBody, Deployment, Indication, IndicationKind};

use crate::upload::manager::UploadedFile;
use crate::upload::progress::ProgressSample;

/// A content the client is about to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub hash: String,
    pub size: u64,
    pub names: Vec<String>,
}

/// Payload of [`DeploymentEvent::FileCount`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCountEvent {
    /// Distinct contents in the manifest
    pub total: u64,

    /// Bytes across the whole manifest
    pub total_size: u64,

    /// Hashes the server reported missing
    pub missing: Vec<String>,

    /// What will actually be uploaded
    pub uploads: Vec<PendingUpload>,
}

impl FileCountEvent {
    pub fn missing_size(&self) -> u64 {
        self.uploads.iter().map(|u| u.size).sum()
    }
}

/// Event of the deployment creation stream.
///
/// `FileUploaded` and `UploadProgress` are produced locally by the upload
/// pipeline; everything else mirrors a server event.
#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentEvent {
    FileCount(FileCountEvent),
    FileUploaded(UploadedFile),
    UploadProgress(ProgressSample),
    Created(Deployment),
    Building(Deployment),
    Ready(Deployment),
    ChecksRunning(Deployment),
    ChecksCompleted(Deployment),
    ChecksConclusionFailed(Deployment),
    Canceled(Deployment),
    AliasAssigned(Deployment),
    Error(ApiErrorBody),
    Tip(Indication),
    Notice(Indication),
    Warning(Indication),
}

impl DeploymentEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DeploymentEvent::FileCount(_) => "file-count",
            DeploymentEvent::FileUploaded(_) => "file-uploaded",
            DeploymentEvent::UploadProgress(_) => "upload-progress",
            DeploymentEvent::Created(_) => "created",
            DeploymentEvent::Building(_) => "building",
            DeploymentEvent::Ready(_) => "ready",
            DeploymentEvent::ChecksRunning(_) => "checks-running",
            DeploymentEvent::ChecksCompleted(_) => "checks-completed",
            DeploymentEvent::ChecksConclusionFailed(_) => "checks-conclusion-failed",
            DeploymentEvent::Canceled(_) => "canceled",
            DeploymentEvent::AliasAssigned(_) => "alias-assigned",
            DeploymentEvent::Error(_) => "error",
            DeploymentEvent::Tip(_) => "tip",
            DeploymentEvent::Notice(_) => "notice",
            DeploymentEvent::Warning(_) => "warning",
        }
    }

    /// Whether the attempt ends with this event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentEvent::Error(_)
                | DeploymentEvent::Canceled(_)
                | DeploymentEvent::ChecksConclusionFailed(_)
                | DeploymentEvent::AliasAssigned(_)
        )
    }

    /// Deployment record carried by the event, if any
    pub fn deployment(&self) -> Option<&Deployment> {
        match self {
            DeploymentEvent::Created(d)
            | DeploymentEvent::Building(d)
            | DeploymentEvent::Ready(d)
            | DeploymentEvent::ChecksRunning(d)
            | DeploymentEvent::ChecksCompleted(d)
            | DeploymentEvent::ChecksConclusionFailed(d)
            | DeploymentEvent::Canceled(d)
            | DeploymentEvent::AliasAssigned(d) => Some(d),
            _ => None,
        }
    }

    pub fn indication(&self) -> Option<(IndicationKind, &Indication)> {
        match self {
            DeploymentEvent::Tip(i) => Some((IndicationKind::Tip, i)),
            DeploymentEvent::Notice(i) => Some((IndicationKind::Notice, i)),
            DeploymentEvent::Warning(i) => Some((IndicationKind::Warning, i)),
            _ => None,
        }
    }
}
