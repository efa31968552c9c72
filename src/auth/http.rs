//! reqwest implementation of [`AuthBackend`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::backend::{AuthBackend, StartResponse};
use super::device_code::DeviceCodeResponse;
use super::error::FlowError;
use super::token::TokenResponse;
use crate::config::LinkConfig;
use crate::error::LinkError;

/// HTTP backend that talks to the dashboard's REST API.
///
/// # Example
/// ```no_run
/// use devicelink::auth::HttpBackend;
/// use devicelink::config::LinkConfig;
///
/// let backend = HttpBackend::new(&LinkConfig::default())?;
/// # Ok::<(), devicelink::error::LinkError>(())
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    authorize_url: String,
    device_code_url: String,
    token_url: String,
    errors_url: String,
}

impl HttpBackend {
    pub fn new(config: &LinkConfig) -> Result<Self, LinkError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &LinkConfig) -> Self {
        Self {
            client,
            authorize_url: config.endpoint_url(&config.endpoints.authorize),
            device_code_url: config.endpoint_url(&config.endpoints.device_code),
            token_url: config.endpoint_url(&config.endpoints.token),
            errors_url: config.endpoint_url(&config.endpoints.errors),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, LinkError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LinkError::unexpected_status(url, status.as_u16(), body));
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn start_authorization(&self) -> Result<StartResponse, LinkError> {
        let resp = self
            .client
            .get(&self.authorize_url)
            .header("Accept", "application/json")
            .send()
            .await?;
        match resp.status() {
            StatusCode::NO_CONTENT => Ok(StartResponse::AlreadyAuthorized),
            StatusCode::OK => Ok(StartResponse::FlowStarted),
            other => {
                let body = resp.text().await.unwrap_or_default();
                Err(LinkError::unexpected_status(
                    &self.authorize_url,
                    other.as_u16(),
                    body,
                ))
            }
        }
    }

    async fn device_code(&self) -> Result<DeviceCodeResponse, LinkError> {
        self.get_json(&self.device_code_url).await
    }

    async fn token(&self) -> Result<TokenResponse, LinkError> {
        self.get_json(&self.token_url).await
    }

    async fn errors(&self) -> Result<Vec<FlowError>, LinkError> {
        let errors: Option<Vec<FlowError>> = self.get_json(&self.errors_url).await?;
        Ok(errors.unwrap_or_default())
    }
}
