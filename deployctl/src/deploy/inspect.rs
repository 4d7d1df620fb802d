//! Polling the state of an existing deployment

use std::time::Duration;

use deploy_api::Deployment;
use tracing::debug;

use crate::deploy::api::DeploymentApi;
use crate::errors::ClientError;

/// Default delay between two polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll until the deployment reaches a terminal ready state.
///
/// Never gives up on its own; wrap it in a deadline to bound it.
pub async fn wait_for_ready(
    api: &dyn DeploymentApi,
    deployment_id: &str,
    interval: Duration,
) -> Result<Deployment, ClientError> {
    loop {
        let deployment = api.get_deployment(deployment_id).await?;
        if deployment.ready_state.is_terminal() {
            return Ok(deployment);
        }
        debug!(
            deployment = %deployment_id,
            state = ?deployment.ready_state,
            "Deployment not ready yet"
        );
        tokio::time::sleep(interval).await;
    }
}
