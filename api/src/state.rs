use std::sync::Arc;

use common::config::Settings;
use common::dispatch::{DeployDispatcher, DispatchClient};
use common::errors::ScheduleError;
use common::reconcile::ScheduleReconciler;
use common::schedule::parse_timezone;
use common::scheduler::JobScheduler;
use common::store::OptionStore;
use common::trigger::PublishTrigger;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn OptionStore>,
    pub scheduler: Arc<dyn JobScheduler>,
    pub dispatcher: Arc<DeployDispatcher>,
    pub reconciler: Arc<ScheduleReconciler>,
    pub trigger: Arc<PublishTrigger>,
}

impl AppState {
    /// Wire the core components around the given collaborators
    pub fn new(
        config: Settings,
        store: Arc<dyn OptionStore>,
        scheduler: Arc<dyn JobScheduler>,
        client: Arc<dyn DispatchClient>,
    ) -> Result<Self, ScheduleError> {
        let timezone = parse_timezone(&config.scheduler.timezone)?;

        let dispatcher = Arc::new(
            DeployDispatcher::new(store.clone(), client, config.http.api_base.clone())
                .with_webhook_override(config.deploy.webhook_override().map(str::to_string)),
        );
        let reconciler = Arc::new(ScheduleReconciler::new(
            store.clone(),
            scheduler.clone(),
            dispatcher.clone(),
            timezone,
        ));
        let trigger = Arc::new(PublishTrigger::new(store.clone(), dispatcher.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            scheduler,
            dispatcher,
            reconciler,
            trigger,
        })
    }
}
