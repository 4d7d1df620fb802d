//! Drives one deployment attempt from request to final outcome.
//!
//! Events of the [`DeploymentEventStream`] feed the status machine, the
//! optional link recorder and, once the deployment exists, the build log
//! follower. The attempt ends at the first terminal event.

use std::sync::Arc;

use async_trait::async_trait;
use deploy_api::{ApiErrorBody, Deployment};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::app::options::ProcessOptions;
use crate::build_logs::{BuildLogSubscriber, LogFollower, OnLogEntry};
use crate::deploy::api::DeploymentApi;
use crate::deploy::events::DeploymentEvent;
use crate::deploy::fsm::StatusFsm;
use crate::deploy::outcome::{CollectedIndication, DeploymentOutcome};
use crate::deploy::stream::{DeploymentEventStream, DeploymentRequest};
use crate::errors::ClientError;
use crate::files::content_map::ContentMap;
use crate::status::StatusIndicator;
use crate::utils::generate_uuid;

/// Links the local project to a created deployment
#[async_trait]
pub trait LinkRecorder: Send + Sync {
    async fn record(&self, deployment: &Deployment) -> Result<(), ClientError>;
}

/// Collaborators of a deployment attempt
#[derive(Clone)]
pub struct DeployContext {
    pub api: Arc<dyn DeploymentApi>,
    pub status: Arc<dyn StatusIndicator>,
    pub link: Option<Arc<dyn LinkRecorder>>,

    /// Receives build log entries when following logs
    pub on_log: Option<OnLogEntry>,
}

impl DeployContext {
    pub fn new(api: Arc<dyn DeploymentApi>, status: Arc<dyn StatusIndicator>) -> Self {
        Self {
            api,
            status,
            link: None,
            on_log: None,
        }
    }
}

/// Run one deployment attempt.
///
/// Returns a [`DeploymentOutcome`] for outcomes the caller can act on;
/// transport failures, protocol violations and unexpected server errors are
/// returned as errors. The status indicator is stopped and the log follower
/// is joined before this returns, whatever the result.
pub async fn process_deployment(
    ctx: &DeployContext,
    request: DeploymentRequest,
    content: Arc<ContentMap>,
    options: &ProcessOptions,
) -> Result<DeploymentOutcome, ClientError> {
    let span = info_span!("deployment", attempt = %generate_uuid(), name = %request.name);
    async move {
        info!(
            files = content.file_count(),
            contents = content.len(),
            bytes = content.total_size(),
            "Starting deployment"
        );

        let mut fsm = StatusFsm::new();
        ctx.status.set_text(fsm.phase().label());

        let mut follower = None;
        let result = match DeploymentEventStream::open(
            ctx.api.clone(),
            &request,
            content,
            options.upload.clone(),
        )
        .await
        {
            Ok(mut stream) => {
                let result = drive(ctx, &mut stream, &mut fsm, &mut follower, options).await;
                stream.close();
                result
            }
            Err(ClientError::Api {
                status,
                code,
                message,
            }) => {
                let body = ApiErrorBody {
                    code,
                    message,
                    link: None,
                    action: None,
                    framework: None,
                };
                match DeploymentOutcome::from_error(&body) {
                    Some(outcome) => {
                        debug!(status, code = %body.code, "Creation request refused");
                        if let Some(text) = fsm.process(&DeploymentEvent::Error(body)) {
                            ctx.status.set_text(&text);
                        }
                        Ok(outcome)
                    }
                    None => Err(ClientError::Api {
                        status,
                        code: body.code,
                        message: body.message,
                    }),
                }
            }
            Err(e) => Err(e),
        };

        if let Some(follower) = follower.take() {
            follower.stop().await;
        }
        ctx.status.stop();

        match &result {
            Ok(outcome) => info!(phase = ?outcome.phase(), "Deployment finished"),
            Err(e) => warn!("Deployment failed: {}", e),
        }
        result
    }
    .instrument(span)
    .await
}

async fn drive(
    ctx: &DeployContext,
    stream: &mut DeploymentEventStream,
    fsm: &mut StatusFsm,
    follower: &mut Option<LogFollower>,
    options: &ProcessOptions,
) -> Result<DeploymentOutcome, ClientError> {
    let mut indications = Vec::new();

    loop {
        let event = match stream.next().await {
            Some(event) => event?,
            None => {
                return Err(ClientError::Protocol(
                    "deployment stream ended before a final event".to_string(),
                ))
            }
        };
        if let Some(text) = fsm.process(&event) {
            ctx.status.set_text(&text);
        }
        if let Some((kind, indication)) = event.indication() {
            ctx.status.note(&indication.message);
            indications.push(CollectedIndication {
                kind,
                indication: indication.clone(),
            });
            continue;
        }

        match event {
            DeploymentEvent::Created(deployment) => {
                debug!(deployment = %deployment.id, "Deployment created");
                if let Some(link) = &ctx.link {
                    link.record(&deployment).await?;
                }
                if let Some(inspector) = &deployment.inspector_url {
                    ctx.status.note(&format!("Inspect: {}", inspector));
                }
                ctx.status.note(&format!("Preview: https://{}", deployment.url));

                if options.follow_logs {
                    match &ctx.on_log {
                        Some(on_log) => {
                            *follower = Some(LogFollower::spawn(
                                BuildLogSubscriber::new(ctx.api.clone()),
                                deployment.id.clone(),
                                on_log.clone(),
                            ));
                        }
                        None => warn!(
                            deployment = %deployment.id,
                            "Following logs requested without a log handler, not subscribing"
                        ),
                    }
                }
            }
            DeploymentEvent::AliasAssigned(deployment) => {
                return Ok(DeploymentOutcome::Ready {
                    deployment,
                    indications,
                });
            }
            DeploymentEvent::ChecksConclusionFailed(deployment) => {
                return Ok(DeploymentOutcome::ChecksFailed(deployment));
            }
            DeploymentEvent::Canceled(deployment) => {
                return Ok(DeploymentOutcome::Canceled(deployment));
            }
            DeploymentEvent::Error(body) => {
                return match DeploymentOutcome::from_error(&body) {
                    Some(outcome) => Ok(outcome),
                    None => Err(ClientError::Deployment {
                        code: body.code,
                        message: body.message,
                    }),
                };
            }
            _ => {}
        }
    }
}
