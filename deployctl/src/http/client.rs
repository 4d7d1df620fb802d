//! HTTP client implementation

use std::time::Duration;

use deploy_api::ErrorResponse;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::app::options::ApiOptions;
use crate::errors::ClientError;

/// HTTP client for the deployment API
pub struct HttpClient {
    client: Client,
    base_url: String,
    team_id: Option<String>,
    token: SecretString,
    request_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(options: &ApiOptions, token: SecretString) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(options.request_timeout)
            .user_agent(concat!("deployctl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            team_id: options.team_id.clone(),
            token,
            request_timeout: options.request_timeout,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of `path`, scoped to the configured team
    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if let Some(team_id) = &self.team_id {
            url.query_pairs_mut().append_pair("teamId", team_id);
        }
        Ok(url)
    }

    /// Authorized request builder
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.url(path)?;
        debug!("{} {}", method, url);
        Ok(self.client.request(method, url).header(
            header::AUTHORIZATION,
            format!("Bearer {}", self.token.expose_secret()),
        ))
    }

    /// Apply the request timeout; not for streaming responses
    pub fn bounded(&self, request: RequestBuilder) -> RequestBuilder {
        request.timeout(self.request_timeout)
    }

    /// Send `request`; non-2xx replies become [`ClientError::Api`]
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!("HTTP request failed: {} - {}", status, body);
        Err(match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) => ClientError::Api {
                status: status.as_u16(),
                code: parsed.error.code,
                message: parsed.error.message,
            },
            Err(_) => ClientError::Api {
                status: status.as_u16(),
                code: "http_error".to_string(),
                message: if body.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body
                },
            },
        })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let request = self.bounded(self.request(Method::GET, path)?);
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }
}
