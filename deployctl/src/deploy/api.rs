//! Remote deployment API seam

use async_trait::async_trait;
use deploy_api::{CreateDeploymentBody, Deployment};
use futures::stream::BoxStream;

use crate::errors::ClientError;
use crate::upload::progress::ByteCounter;

/// Newline-delimited body, one decoded line per item
pub type LineStream = BoxStream<'static, Result<String, ClientError>>;

/// One content upload
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Content hash the server keys the upload by
    pub hash: String,

    /// The whole content; sent as a single request body
    pub data: Vec<u8>,

    /// Advanced by the transport as the body is consumed
    pub progress: ByteCounter,
}

/// Reading direction of the log stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogDirection {
    #[default]
    Forward,
    Backward,
}

impl LogDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogDirection::Forward => "forward",
            LogDirection::Backward => "backward",
        }
    }
}

/// Parameters of the log stream request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogQuery {
    pub direction: LogDirection,

    /// Keep the connection open for new entries
    pub follow: bool,
}

/// Deployment API operations used by the client
#[async_trait]
pub trait DeploymentApi: Send + Sync {
    /// Start a deployment; the response body is the creation event stream
    async fn create_deployment(&self, body: &CreateDeploymentBody) -> Result<LineStream, ClientError>;

    /// Upload one content; re-uploading a known hash is a successful no-op
    async fn upload_file(&self, upload: FileUpload) -> Result<(), ClientError>;

    /// Open the build log stream of a deployment
    async fn deployment_logs(&self, deployment_id: &str, query: LogQuery) -> Result<LineStream, ClientError>;

    /// Fetch the current state of a deployment
    async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment, ClientError>;
}
