//! Build log subscription of one deployment.

use std::sync::Arc;

use deploy_api::LogEntry;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::deploy::api::{DeploymentApi, LineStream, LogDirection, LogQuery};
use crate::errors::ClientError;

/// Opens build log streams
#[derive(Clone)]
pub struct BuildLogSubscriber {
    api: Arc<dyn DeploymentApi>,
}

impl BuildLogSubscriber {
    pub fn new(api: Arc<dyn DeploymentApi>) -> Self {
        Self { api }
    }

    /// Open the log stream of `deployment_id`.
    ///
    /// The subscription ends when the server closes the stream, when `cancel`
    /// fires, or after the first malformed entry.
    pub async fn subscribe(
        &self,
        deployment_id: &str,
        query: LogQuery,
        cancel: CancellationToken,
    ) -> Result<LogSubscription, ClientError> {
        debug!(deployment = %deployment_id, follow = query.follow, "Opening build log stream");
        let lines = tokio::select! {
            _ = cancel.cancelled() => None,
            opened = self.api.deployment_logs(deployment_id, query) => Some(opened?),
        };
        Ok(LogSubscription {
            deployment_id: deployment_id.to_string(),
            finished: lines.is_none(),
            lines,
            cancel,
        })
    }

    /// Read the whole log as it stands now
    pub async fn fetch(&self, deployment_id: &str, direction: LogDirection) -> Result<Vec<LogEntry>, ClientError> {
        let query = LogQuery {
            direction,
            follow: false,
        };
        let mut subscription = self.subscribe(deployment_id, query, CancellationToken::new()).await?;
        let mut entries = Vec::new();
        while let Some(entry) = subscription.next().await {
            entries.push(entry?);
        }
        Ok(entries)
    }
}

/// Lazy sequence of build log entries
pub struct LogSubscription {
    deployment_id: String,
    lines: Option<LineStream>,
    cancel: CancellationToken,
    finished: bool,
}

impl LogSubscription {
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    /// Token that ends the subscription when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next entry; `None` once the stream ended or was cancelled
    pub async fn next(&mut self) -> Option<Result<LogEntry, ClientError>> {
        loop {
            if self.finished {
                return None;
            }
            let lines = self.lines.as_mut()?;

            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                item = lines.next() => Some(item),
            };
            let Some(item) = item else {
                debug!(deployment = %self.deployment_id, "Build log stream cancelled");
                self.close();
                return None;
            };

            match item {
                None => {
                    self.close();
                    return None;
                }
                Some(Err(e)) => {
                    self.close();
                    return Some(Err(e));
                }
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => match serde_json::from_str::<LogEntry>(line.trim()) {
                    Ok(entry) => return Some(Ok(entry)),
                    Err(e) => {
                        self.close();
                        return Some(Err(ClientError::LogStream(format!("malformed log entry: {}", e))));
                    }
                },
            }
        }
    }

    /// Drop the connection
    pub fn close(&mut self) {
        self.lines = None;
        self.finished = true;
    }
}
