// Deploy dispatcher: resolves the deploy target and fires one workflow dispatch

pub mod http;

pub use http::ReqwestDispatchClient;

use crate::errors::{DispatchError, StoreError};
use crate::models::{
    DeployTarget, DispatchOutcome, OptionKey, TargetView, TriggerSource, DEFAULT_DEPLOY_BRANCH,
};
use crate::store::OptionStore;
use crate::telemetry;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// One outbound workflow dispatch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub url: String,
    pub token: String,
    pub branch: String,
}

impl DispatchRequest {
    pub fn body(&self) -> serde_json::Value {
        json!({ "ref": self.branch })
    }
}

/// Transport used to deliver a dispatch request
///
/// Returns the HTTP status of an accepted (2xx) request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DispatchClient: Send + Sync {
    async fn send(&self, request: &DispatchRequest) -> Result<u16, DispatchError>;
}

/// Fires workflow dispatches for the configured deploy target
pub struct DeployDispatcher {
    store: Arc<dyn OptionStore>,
    client: Arc<dyn DispatchClient>,
    webhook_override: Option<String>,
    api_base: String,
}

impl DeployDispatcher {
    pub fn new(
        store: Arc<dyn OptionStore>,
        client: Arc<dyn DispatchClient>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            store,
            client,
            webhook_override: None,
            api_base: api_base.into(),
        }
    }

    /// Pin the dispatch URL, ignoring the stored webhook address
    pub fn with_webhook_override(mut self, webhook_address: Option<String>) -> Self {
        self.webhook_override = webhook_address.filter(|s| !s.trim().is_empty());
        self
    }

    /// Resolve the dispatch URL: override, then stored address, then owner/repo/workflow
    async fn resolve_url(&self) -> Result<Option<String>, StoreError> {
        if let Some(url) = &self.webhook_override {
            return Ok(Some(url.clone()));
        }
        if let Some(url) = self.store.get(OptionKey::WebhookAddress).await? {
            return Ok(Some(url.trim().to_string()));
        }

        let owner = self.store.get(OptionKey::GithubOwner).await?;
        let repo = self.store.get(OptionKey::GithubRepo).await?;
        let workflow = self.store.get(OptionKey::GithubWorkflow).await?;
        Ok(match (owner, repo, workflow) {
            (Some(owner), Some(repo), Some(workflow)) => Some(format!(
                "{}/repos/{}/{}/actions/workflows/{}",
                self.api_base.trim_end_matches('/'),
                owner.trim(),
                repo.trim(),
                workflow.trim()
            )),
            _ => None,
        })
    }

    /// Read the current deploy target from the store
    pub async fn resolve_target(&self) -> Result<DeployTarget, StoreError> {
        let dispatch_url = self.resolve_url().await?;
        let token = self
            .store
            .get(OptionKey::GithubAccessToken)
            .await?
            .unwrap_or_default();
        let branch = self
            .store
            .get(OptionKey::GithubDeployBranch)
            .await?
            .map(|b| b.trim().to_string())
            .unwrap_or_else(|| DEFAULT_DEPLOY_BRANCH.to_string());

        Ok(DeployTarget {
            dispatch_url,
            token: token.trim().to_string(),
            branch,
        })
    }

    /// Display-safe view of the resolved target
    pub async fn describe_target(&self) -> Result<TargetView, StoreError> {
        let target = self.resolve_target().await?;
        Ok(TargetView {
            dispatch_url: target.dispatches_endpoint(),
            branch: target.branch,
            has_token: !target.token.is_empty(),
            url_from_override: self.webhook_override.is_some(),
        })
    }

    /// Send one workflow dispatch, or skip when the target is incomplete
    #[instrument(skip(self))]
    pub async fn fire_deploy(&self, source: TriggerSource) -> Result<DispatchOutcome, DispatchError> {
        let target = self.resolve_target().await?;

        let (Some(url), None) = (target.dispatches_endpoint(), target.missing_field()) else {
            let reason = format!(
                "{} is not configured",
                target.missing_field().unwrap_or("dispatch_url")
            );
            info!(reason = %reason, "Deploy skipped");
            telemetry::record_deploy_skipped(source);
            return Ok(DispatchOutcome::Skipped { reason });
        };

        let request = DispatchRequest {
            url,
            token: target.token,
            branch: target.branch,
        };

        match self.client.send(&request).await {
            Ok(status) => {
                info!(url = %request.url, branch = %request.branch, status, "Workflow dispatch sent");
                telemetry::record_deploy_dispatched(source);
                Ok(DispatchOutcome::Dispatched { status })
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Workflow dispatch failed");
                telemetry::record_deploy_failed(source);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryOptionStore;

    fn store(values: &[(OptionKey, &str)]) -> Arc<InMemoryOptionStore> {
        Arc::new(InMemoryOptionStore::with_values(values.iter().map(|(k, v)| (*k, *v))))
    }

    #[tokio::test]
    async fn test_skips_without_calling_client_when_url_missing() {
        let mut client = MockDispatchClient::new();
        client.expect_send().times(0);

        let dispatcher = DeployDispatcher::new(
            store(&[(OptionKey::GithubAccessToken, "secret")]),
            Arc::new(client),
            "https://api.github.com",
        );

        let outcome = dispatcher.fire_deploy(TriggerSource::Manual).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Skipped {
                reason: "dispatch_url is not configured".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_sends_branch_and_token() {
        let mut client = MockDispatchClient::new();
        client
            .expect_send()
            .withf(|req| {
                req.url == "https://api.github.com/repos/acme/site/actions/workflows/deploy.yml/dispatches"
                    && req.token == "secret"
                    && req.branch == "production"
            })
            .times(1)
            .returning(|_| Ok(204));

        let dispatcher = DeployDispatcher::new(
            store(&[
                (OptionKey::GithubOwner, "acme"),
                (OptionKey::GithubRepo, "site"),
                (OptionKey::GithubWorkflow, "deploy.yml"),
                (OptionKey::GithubAccessToken, "secret"),
                (OptionKey::GithubDeployBranch, "production"),
            ]),
            Arc::new(client),
            "https://api.github.com/",
        );

        let outcome = dispatcher.fire_deploy(TriggerSource::Manual).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Dispatched { status: 204 });
    }

    #[tokio::test]
    async fn test_override_wins_over_stored_address() {
        let mut client = MockDispatchClient::new();
        client
            .expect_send()
            .withf(|req| req.url == "https://pinned.test/wf/dispatches" && req.branch == "main")
            .times(1)
            .returning(|_| Ok(204));

        let dispatcher = DeployDispatcher::new(
            store(&[
                (OptionKey::WebhookAddress, "https://stored.test/wf/dispatches"),
                (OptionKey::GithubAccessToken, "secret"),
            ]),
            Arc::new(client),
            "https://api.github.com",
        )
        .with_webhook_override(Some("https://pinned.test/wf".to_string()));

        assert!(dispatcher
            .fire_deploy(TriggerSource::Scheduled)
            .await
            .unwrap()
            .is_dispatched());
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut client = MockDispatchClient::new();
        client
            .expect_send()
            .times(1)
            .returning(|_| Err(DispatchError::Transport("connection refused".to_string())));

        let dispatcher = DeployDispatcher::new(
            store(&[
                (OptionKey::WebhookAddress, "https://stored.test/wf"),
                (OptionKey::GithubAccessToken, "secret"),
            ]),
            Arc::new(client),
            "https://api.github.com",
        );

        let err = dispatcher.fire_deploy(TriggerSource::Manual).await.unwrap_err();
        assert!(err.is_transport_failure());
    }

    #[tokio::test]
    async fn test_each_missing_identity_part_skips() {
        let full = [
            (OptionKey::GithubOwner, "acme"),
            (OptionKey::GithubRepo, "site"),
            (OptionKey::GithubWorkflow, "deploy.yml"),
        ];
        for missing in 0..full.len() {
            let mut values: Vec<_> = full
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != missing)
                .map(|(_, kv)| *kv)
                .collect();
            values.push((OptionKey::GithubAccessToken, "secret"));

            let mut client = MockDispatchClient::new();
            client.expect_send().times(0);
            let dispatcher =
                DeployDispatcher::new(store(&values), Arc::new(client), "https://api.github.com");

            let outcome = dispatcher.fire_deploy(TriggerSource::Manual).await.unwrap();
            assert!(!outcome.is_dispatched(), "{:?} missing", full[missing].0);
        }
    }

    #[tokio::test]
    async fn test_describe_target_hides_token() {
        let dispatcher = DeployDispatcher::new(
            store(&[
                (OptionKey::WebhookAddress, "https://stored.test/wf/dispatches"),
                (OptionKey::GithubAccessToken, "secret"),
            ]),
            Arc::new(MockDispatchClient::new()),
            "https://api.github.com",
        );

        let view = dispatcher.describe_target().await.unwrap();
        assert_eq!(view.dispatch_url.as_deref(), Some("https://stored.test/wf/dispatches"));
        assert_eq!(view.branch, "main");
        assert!(view.has_token);
        assert!(!view.url_from_override);
    }
}
