//! API models

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Server-reported lifecycle phase of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadyState {
    Initializing,
    Queued,
    Building,
    Ready,
    Error,
    Canceled,
}

impl ReadyState {
    /// Whether the deployment will not change state anymore
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadyState::Ready | ReadyState::Error | ReadyState::Canceled)
    }
}

/// Deployment target environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Production,
    Preview,
}

/// State of the checks attached to a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksState {
    Registered,
    Running,
    Completed,
}

/// Conclusion of the checks attached to a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksConclusion {
    Succeeded,
    Failed,
    Skipped,
    Canceled,
}

/// A deployment as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    pub ready_state: ReadyState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspector_url: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks_state: Option<ChecksState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks_conclusion: Option<ChecksConclusion>,
}

impl Deployment {
    /// Checks are registered or running and have not reported yet.
    ///
    /// A deployment without checks and one whose checks completed are both
    /// "not pending".
    pub fn checks_pending(&self) -> bool {
        matches!(
            self.checks_state,
            Some(ChecksState::Registered) | Some(ChecksState::Running)
        )
    }
}

/// Framework detected for a project, attached to `missing_project_settings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkHint {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Error payload sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<FrameworkHint>,
}

/// Error response body of non-2xx replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ApiErrorBody,
}

/// Advisory message attached to a deployment (tip, notice or warning)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indication {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Kind of an advisory message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicationKind {
    Tip,
    Notice,
    Warning,
}

/// Payload of `file-count`: what the server already has and what it lacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCount {
    /// Number of distinct contents in the manifest
    pub total: u64,
    #[serde(default)]
    pub total_size: u64,
    /// Content hashes the server does not have yet
    #[serde(default)]
    pub missing: Vec<String>,
}

/// One line of the deployment creation stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerEvent {
    FileCount(FileCount),
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

impl ServerEvent {
    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::FileCount(_) => "file-count",
            ServerEvent::Created(_) => "created",
            ServerEvent::Building(_) => "building",
            ServerEvent::Ready(_) => "ready",
            ServerEvent::ChecksRunning(_) => "checks-running",
            ServerEvent::ChecksCompleted(_) => "checks-completed",
            ServerEvent::ChecksConclusionFailed(_) => "checks-conclusion-failed",
            ServerEvent::Canceled(_) => "canceled",
            ServerEvent::AliasAssigned(_) => "alias-assigned",
            ServerEvent::Error(_) => "error",
            ServerEvent::Tip(_) => "tip",
            ServerEvent::Notice(_) => "notice",
            ServerEvent::Warning(_) => "warning",
        }
    }

    /// Whether this event ends the creation stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerEvent::Error(_)
                | ServerEvent::Canceled(_)
                | ServerEvent::ChecksConclusionFailed(_)
                | ServerEvent::AliasAssigned(_)
        )
    }
}

/// One distinct content in the deployment manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub sha: String,
    pub size: u64,
    /// Relative paths sharing this content
    pub names: Vec<String>,
}

/// Body of the deployment creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentBody {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    pub files: Vec<ManifestFile>,
}

/// Source of a build log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogKind {
    Command,
    Stdout,
    Stderr,
    Exit,
    Delimiter,
    DeploymentState,
    #[serde(other)]
    Other,
}

/// One entry of the build log stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    /// Milliseconds since the Unix epoch
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl LogEntry {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created).single()
    }
}
