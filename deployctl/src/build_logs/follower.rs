//! Background task forwarding build log entries while a deployment runs.

use std::sync::Arc;

use deploy_api::LogEntry;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::build_logs::subscriber::BuildLogSubscriber;
use crate::deploy::api::LogQuery;

/// Callback invoked with each build log entry
pub type OnLogEntry = Arc<dyn Fn(LogEntry) + Send + Sync + 'static>;

/// Follows the build log of one deployment until stopped.
///
/// Dropping the follower cancels the subscription; [`LogFollower::stop`]
/// also waits until no further entry can be delivered.
pub struct LogFollower {
    guard: Option<DropGuard>,
    handle: Option<JoinHandle<()>>,
}

impl LogFollower {
    pub fn spawn(subscriber: BuildLogSubscriber, deployment_id: String, on_entry: OnLogEntry) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let query = LogQuery {
                follow: true,
                ..Default::default()
            };
            let mut subscription = match subscriber.subscribe(&deployment_id, query, token).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!(deployment = %deployment_id, "Cannot open build logs: {}", e);
                    return;
                }
            };
            while let Some(entry) = subscription.next().await {
                match entry {
                    Ok(entry) => on_entry(entry),
                    Err(e) => {
                        warn!(deployment = %deployment_id, "Build log stream failed: {}", e);
                        break;
                    }
                }
            }
            debug!(deployment = %deployment_id, "Build log follower finished");
        });

        Self {
            guard: Some(cancel.drop_guard()),
            handle: Some(handle),
        }
    }

    /// Cancel the subscription and wait for the task to exit
    pub async fn stop(mut self) {
        drop(self.guard.take());
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Build log follower task failed: {}", e);
            }
        }
    }
}
