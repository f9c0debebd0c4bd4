// reqwest-backed dispatch transport

use super::{DispatchClient, DispatchRequest};
use crate::errors::DispatchError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

const GITHUB_JSON: &str = "application/vnd.github+json";

/// Sends dispatch requests over HTTPS with bearer authentication
pub struct ReqwestDispatchClient {
    client: Client,
    user_agent: String,
}

impl ReqwestDispatchClient {
    /// Create a new client with the specified timeout
    pub fn new(timeout_seconds: u64, user_agent: impl Into<String>) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| DispatchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }
}

#[async_trait]
impl DispatchClient for ReqwestDispatchClient {
    #[tracing::instrument(skip(self, request), fields(url = %request.url, branch = %request.branch))]
    async fn send(&self, request: &DispatchRequest) -> Result<u16, DispatchError> {
        let response = self
            .client
            .post(&request.url)
            .bearer_auth(&request.token)
            .header(ACCEPT, GITHUB_JSON)
            .header(USER_AGENT, &self.user_agent)
            .json(&request.body())
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "Dispatch response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(status.as_u16())
    }
}
