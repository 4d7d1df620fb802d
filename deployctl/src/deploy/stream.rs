//! Pull-based stream of one deployment attempt.
//!
//! The server's creation stream is read line by line. When it reports missing
//! contents, reading pauses while the upload run is drained, so upload events
//! always sit between `file-count` and `created`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use deploy_api::{CreateDeploymentBody, ServerEvent, Target};
use futures::StreamExt;
use tracing::{debug, warn};

use crate::deploy::api::{DeploymentApi, LineStream};
use crate::deploy::events::{DeploymentEvent, FileCountEvent, PendingUpload};
use crate::errors::ClientError;
use crate::files::content_map::ContentMap;
use crate::upload::manager::{UploadEvent, UploadManager, UploadOptions, UploadRun};

/// What to deploy, apart from the files themselves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub name: String,
    pub project: Option<String>,
    pub target: Option<Target>,
    pub meta: BTreeMap<String, String>,
}

impl DeploymentRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Request body carrying the manifest of `content`
    pub fn body(&self, content: &ContentMap) -> CreateDeploymentBody {
        CreateDeploymentBody {
            name: self.name.clone(),
            project: self.project.clone(),
            target: self.target,
            meta: self.meta.clone(),
            files: content.manifest(),
        }
    }
}

/// Ordered, finite sequence of [`DeploymentEvent`]s.
///
/// Ends right after the first terminal event. Dropping it closes the
/// underlying connection and aborts in-flight uploads.
pub struct DeploymentEventStream {
    lines: Option<LineStream>,
    content: Arc<ContentMap>,
    uploader: UploadManager,
    upload: Option<UploadRun>,
    pending: VecDeque<DeploymentEvent>,
    file_count_seen: bool,
    created: bool,
    finished: bool,
}

impl DeploymentEventStream {
    /// Send the creation request and return the stream of its events
    pub async fn open(
        api: Arc<dyn DeploymentApi>,
        request: &DeploymentRequest,
        content: Arc<ContentMap>,
        upload: UploadOptions,
    ) -> Result<Self, ClientError> {
        let body = request.body(&content);
        debug!(
            name = %body.name,
            files = body.files.len(),
            "Creating deployment"
        );
        let lines = api.create_deployment(&body).await?;
        Ok(Self::from_lines(lines, api, content, upload))
    }

    /// Stream over an already opened creation response
    pub fn from_lines(
        lines: LineStream,
        api: Arc<dyn DeploymentApi>,
        content: Arc<ContentMap>,
        upload: UploadOptions,
    ) -> Self {
        Self {
            lines: Some(lines),
            content,
            uploader: UploadManager::new(api, upload),
            upload: None,
            pending: VecDeque::new(),
            file_count_seen: false,
            created: false,
            finished: false,
        }
    }

    /// Whether the server already reported the deployment as created
    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Next event; `None` after the terminal event or an error
    pub async fn next(&mut self) -> Option<Result<DeploymentEvent, ClientError>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if event.is_terminal() {
                    self.close();
                }
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }

            if let Some(run) = self.upload.as_mut() {
                match run.next().await {
                    Some(Ok(UploadEvent::Progress(sample))) => {
                        return Some(Ok(DeploymentEvent::UploadProgress(sample)));
                    }
                    Some(Ok(UploadEvent::Uploaded(file))) => {
                        return Some(Ok(DeploymentEvent::FileUploaded(file)));
                    }
                    Some(Err(e)) => {
                        self.close();
                        return Some(Err(e));
                    }
                    None => {
                        self.upload = None;
                        continue;
                    }
                }
            }

            let Some(lines) = self.lines.as_mut() else {
                self.finished = true;
                return None;
            };
            let line = match lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.close();
                    return Some(Err(e));
                }
                None => {
                    self.close();
                    return Some(Err(ClientError::Protocol(
                        "deployment stream ended before a final event".to_string(),
                    )));
                }
            };

            match self.accept(&line) {
                Ok(Some(event)) => self.pending.push_back(event),
                Ok(None) => {}
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            }
        }
    }

    /// Stop reading; drops the connection and any running uploads
    pub fn close(&mut self) {
        self.lines = None;
        self.upload = None;
        self.pending.retain(|e| !e.is_terminal());
        self.finished = true;
    }

    fn accept(&mut self, line: &str) -> Result<Option<DeploymentEvent>, ClientError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let event: ServerEvent = serde_json::from_str(line)
            .map_err(|e| ClientError::Protocol(format!("invalid deployment event: {}", e)))?;
        debug!(kind = event.kind(), "Deployment event");

        let event = match event {
            ServerEvent::FileCount(count) => {
                if self.file_count_seen || self.created {
                    return Err(ClientError::Protocol(
                        "file-count received after the deployment started".to_string(),
                    ));
                }
                self.file_count_seen = true;
                if count.missing.is_empty() {
                    return Ok(None);
                }

                let run = self.uploader.upload(self.content.clone(), &count.missing);
                if run.is_empty() {
                    warn!("None of the missing contents are part of the deployment");
                    return Ok(None);
                }
                let uploads = run
                    .tasks()
                    .iter()
                    .map(|task| PendingUpload {
                        hash: task.hash.clone(),
                        size: task.size,
                        names: self
                            .content
                            .get(&task.hash)
                            .map(|e| e.names.iter().cloned().collect())
                            .unwrap_or_default(),
                    })
                    .collect();
                self.upload = Some(run);
                DeploymentEvent::FileCount(FileCountEvent {
                    total: count.total,
                    total_size: count.total_size,
                    missing: count.missing,
                    uploads,
                })
            }
            ServerEvent::Created(d) => {
                if self.created {
                    return Err(ClientError::Protocol("duplicate created event".to_string()));
                }
                self.created = true;
                DeploymentEvent::Created(d)
            }
            ServerEvent::Building(d) => DeploymentEvent::Building(self.after_created("building", d)?),
            ServerEvent::Ready(d) => DeploymentEvent::Ready(self.after_created("ready", d)?),
            ServerEvent::ChecksRunning(d) => {
                DeploymentEvent::ChecksRunning(self.after_created("checks-running", d)?)
            }
            ServerEvent::ChecksCompleted(d) => {
                DeploymentEvent::ChecksCompleted(self.after_created("checks-completed", d)?)
            }
            ServerEvent::ChecksConclusionFailed(d) => DeploymentEvent::ChecksConclusionFailed(
                self.after_created("checks-conclusion-failed", d)?,
            ),
            ServerEvent::Canceled(d) => DeploymentEvent::Canceled(self.after_created("canceled", d)?),
            ServerEvent::AliasAssigned(d) => {
                DeploymentEvent::AliasAssigned(self.after_created("alias-assigned", d)?)
            }
            ServerEvent::Error(body) => DeploymentEvent::Error(body),
            ServerEvent::Tip(i) => DeploymentEvent::Tip(i),
            ServerEvent::Notice(i) => DeploymentEvent::Notice(i),
            ServerEvent::Warning(i) => DeploymentEvent::Warning(i),
        };
        Ok(Some(event))
    }

    fn after_created<T>(&self, kind: &str, payload: T) -> Result<T, ClientError> {
        if self.created {
            Ok(payload)
        } else {
            Err(ClientError::Protocol(format!("{} received before created", kind)))
        }
    }
}
