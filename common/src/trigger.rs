// Publish-event trigger: deploys when posts cross the publish boundary

use crate::dispatch::DeployDispatcher;
use crate::errors::StoreError;
use crate::models::{parse_flag, OptionKey, PostStatus, TriggerSource};
use crate::store::OptionStore;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Whether a post status transition should fire a deploy
///
/// API-originated transitions are skipped because the editor's own save
/// reports the same transition a second time. Only moves into or out of
/// `publish` count.
pub fn should_fire_on_transition(
    old_status: &PostStatus,
    new_status: &PostStatus,
    is_api_request: bool,
    config_enabled: bool,
) -> bool {
    config_enabled && !is_api_request && (old_status.is_publish() || new_status.is_publish())
}

pub struct PublishTrigger {
    store: Arc<dyn OptionStore>,
    dispatcher: Arc<DeployDispatcher>,
}

impl PublishTrigger {
    pub fn new(store: Arc<dyn OptionStore>, dispatcher: Arc<DeployDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    pub async fn is_enabled(&self) -> Result<bool, StoreError> {
        Ok(parse_flag(
            self.store.get(OptionKey::EnableOnPostUpdate).await?.as_deref(),
        ))
    }

    /// Handle a post status transition; returns whether a deploy was attempted
    #[instrument(skip(self))]
    pub async fn on_transition(
        &self,
        old_status: &PostStatus,
        new_status: &PostStatus,
        is_api_request: bool,
    ) -> Result<bool, StoreError> {
        let enabled = self.is_enabled().await?;
        if !should_fire_on_transition(old_status, new_status, is_api_request, enabled) {
            debug!(enabled, "Transition does not trigger a deploy");
            return Ok(false);
        }
        self.fire(TriggerSource::PostTransition).await;
        Ok(true)
    }

    /// Handle a future-scheduled post going live; returns whether a deploy was attempted
    #[instrument(skip(self))]
    pub async fn on_future_post_published(&self, post_id: u64) -> Result<bool, StoreError> {
        if !self.is_enabled().await? {
            return Ok(false);
        }
        self.fire(TriggerSource::FuturePost).await;
        Ok(true)
    }

    async fn fire(&self, source: TriggerSource) {
        match self.dispatcher.fire_deploy(source).await {
            Ok(outcome) => debug!(outcome = ?outcome, "Post-triggered deploy finished"),
            Err(e) => warn!(error = %e, "Post-triggered deploy failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MockDispatchClient;
    use crate::store::InMemoryOptionStore;

    fn status(s: &str) -> PostStatus {
        PostStatus::from(s)
    }

    fn trigger(enabled: bool, client: MockDispatchClient) -> PublishTrigger {
        let mut values = vec![
            (OptionKey::WebhookAddress, "https://example.test/wf"),
            (OptionKey::GithubAccessToken, "secret"),
        ];
        if enabled {
            values.push((OptionKey::EnableOnPostUpdate, "enable"));
        }
        let store = Arc::new(InMemoryOptionStore::with_values(values));
        let dispatcher = Arc::new(DeployDispatcher::new(
            store.clone(),
            Arc::new(client),
            "https://api.github.com",
        ));
        PublishTrigger::new(store, dispatcher)
    }

    #[test]
    fn test_decision_table() {
        assert!(!should_fire_on_transition(&status("draft"), &status("publish"), true, true));
        assert!(should_fire_on_transition(&status("draft"), &status("publish"), false, true));
        assert!(should_fire_on_transition(&status("publish"), &status("draft"), false, true));
        assert!(!should_fire_on_transition(&status("draft"), &status("pending"), false, true));
        assert!(should_fire_on_transition(&status("publish"), &status("publish"), false, true));
        assert!(!should_fire_on_transition(&status("draft"), &status("publish"), false, false));
    }

    #[tokio::test]
    async fn test_transition_fires_once() {
        let mut client = MockDispatchClient::new();
        client.expect_send().times(1).returning(|_| Ok(204));
        let trigger = trigger(true, client);

        assert!(trigger
            .on_transition(&PostStatus::Draft, &PostStatus::Publish, false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_api_transition_is_suppressed() {
        let mut client = MockDispatchClient::new();
        client.expect_send().times(0);
        let trigger = trigger(true, client);

        assert!(!trigger
            .on_transition(&PostStatus::Draft, &PostStatus::Publish, true)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_future_post_fires_only_when_enabled() {
        let mut client = MockDispatchClient::new();
        client.expect_send().times(0);
        assert!(!trigger(false, client).on_future_post_published(7).await.unwrap());

        let mut client = MockDispatchClient::new();
        client.expect_send().times(1).returning(|_| Ok(204));
        assert!(trigger(true, client).on_future_post_published(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_swallowed() {
        let mut client = MockDispatchClient::new();
        client
            .expect_send()
            .times(1)
            .returning(|_| Err(crate::errors::DispatchError::Transport("timeout".to_string())));
        let trigger = trigger(true, client);

        assert!(trigger
            .on_transition(&PostStatus::Publish, &PostStatus::Trash, false)
            .await
            .unwrap());
    }
}
