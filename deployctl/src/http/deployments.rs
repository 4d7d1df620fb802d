//! Deployment API client

use async_trait::async_trait;
use deploy_api::{CreateDeploymentBody, Deployment};
use reqwest::Method;

use crate::deploy::api::{DeploymentApi, FileUpload, LineStream, LogQuery};
use crate::errors::ClientError;
use crate::http::client::HttpClient;
use crate::http::lines::line_stream;

#[async_trait]
impl DeploymentApi for HttpClient {
    async fn create_deployment(&self, body: &CreateDeploymentBody) -> Result<LineStream, ClientError> {
        let request = self.request(Method::POST, "/v13/deployments")?.json(body);
        let response = self.send(request).await?;
        Ok(line_stream(response, ClientError::Protocol))
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<(), ClientError> {
        self.post_file(upload).await
    }

    async fn deployment_logs(&self, deployment_id: &str, query: LogQuery) -> Result<LineStream, ClientError> {
        let path = format!("/v3/deployments/{}/events", deployment_id);
        let request = self.request(Method::GET, &path)?.query(&[
            ("direction", query.direction.as_str()),
            ("follow", if query.follow { "1" } else { "0" }),
            ("format", "lines"),
        ]);
        let response = self.send(request).await?;
        Ok(line_stream(response, ClientError::LogStream))
    }

    async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment, ClientError> {
        self.get(&format!("/v13/deployments/{}", deployment_id)).await
    }
}
