// Schedule reconciler: keeps the single recurring build job in line with settings
//
// Two states per installation: no job, or one job named `scheduled_build`
// matching the current frequency and time of day.

use crate::dispatch::DeployDispatcher;
use crate::errors::ScheduleError;
use crate::models::{parse_flag, Frequency, OptionKey, ScheduleConfig, ScheduledJob, TriggerSource};
use crate::schedule::{next_occurrence, parse_time_of_day};
use crate::scheduler::{JobHandler, JobScheduler};
use crate::store::OptionStore;
use crate::telemetry;
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Well-known name of the recurring build job
pub const SCHEDULED_BUILD_JOB: &str = "scheduled_build";

const MAX_CLEAR_ATTEMPTS: u32 = 5;

/// What a reconciliation did to the recurring job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconcileAction {
    Created { next_run: DateTime<Utc> },
    Recreated { next_run: DateTime<Utc> },
    Removed,
    Unchanged,
}

impl ReconcileAction {
    fn label(&self) -> &'static str {
        match self {
            ReconcileAction::Created { .. } => "created",
            ReconcileAction::Recreated { .. } => "recreated",
            ReconcileAction::Removed => "removed",
            ReconcileAction::Unchanged => "unchanged",
        }
    }
}

pub struct ScheduleReconciler {
    store: Arc<dyn OptionStore>,
    scheduler: Arc<dyn JobScheduler>,
    dispatcher: Arc<DeployDispatcher>,
    timezone: Tz,
    clock: fn() -> DateTime<Utc>,
}

impl ScheduleReconciler {
    pub fn new(
        store: Arc<dyn OptionStore>,
        scheduler: Arc<dyn JobScheduler>,
        dispatcher: Arc<DeployDispatcher>,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            scheduler,
            dispatcher,
            timezone,
            clock: Utc::now,
        }
    }

    /// Replace the time source used for first-fire calculation
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Read the schedule settings, falling back to weekly at 00:00
    pub async fn load_config(&self) -> Result<ScheduleConfig, ScheduleError> {
        let enabled = parse_flag(self.store.get(OptionKey::EnableScheduledBuilds).await?.as_deref());
        let frequency =
            Frequency::from_option(self.store.get(OptionKey::SelectScheduleBuilds).await?.as_deref());
        let time_of_day = match self.store.get(OptionKey::SelectTimeBuild).await? {
            Some(raw) => parse_time_of_day(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Stored build time is invalid, using 00:00");
                NaiveTime::MIN
            }),
            None => NaiveTime::MIN,
        };

        Ok(ScheduleConfig {
            enabled,
            frequency,
            time_of_day,
        })
    }

    /// The current recurring job, if any
    pub async fn current_job(&self) -> Result<Option<ScheduledJob>, ScheduleError> {
        self.scheduler.job(SCHEDULED_BUILD_JOB).await
    }

    /// Remove the recurring job; a missing job is not an error
    ///
    /// The engine may advance the job between reading its next run and
    /// removing it, so a timestamp mismatch re-reads and tries again.
    async fn clear_job(&self) -> Result<bool, ScheduleError> {
        for attempt in 1..=MAX_CLEAR_ATTEMPTS {
            let Some(timestamp) = self.scheduler.next_scheduled(SCHEDULED_BUILD_JOB).await? else {
                debug!("No scheduled build to remove");
                return Ok(false);
            };
            if self
                .scheduler
                .unschedule(SCHEDULED_BUILD_JOB, timestamp)
                .await?
            {
                return Ok(true);
            }
            debug!(attempt, "Scheduled build moved during removal, retrying");
        }

        Err(ScheduleError::RemovalContended {
            name: SCHEDULED_BUILD_JOB.to_string(),
            attempts: MAX_CLEAR_ATTEMPTS,
        })
    }

    async fn create_job(&self, config: &ScheduleConfig) -> Result<DateTime<Utc>, ScheduleError> {
        let first_run = next_occurrence(config.time_of_day, (self.clock)(), self.timezone);
        self.scheduler
            .schedule_recurring(SCHEDULED_BUILD_JOB, first_run, config.frequency.cadence())
            .await?;
        Ok(first_run)
    }

    fn record(&self, action: ReconcileAction) -> ReconcileAction {
        if action != ReconcileAction::Unchanged {
            telemetry::record_schedule_reconciled(action.label());
        }
        action
    }

    /// Destroy any existing job, then recreate it if scheduling is enabled
    ///
    /// Called on every write to the enable flag, frequency or time of day.
    #[instrument(skip(self))]
    pub async fn on_settings_changed(&self) -> Result<ReconcileAction, ScheduleError> {
        let config = self.load_config().await?;
        let removed = self.clear_job().await?;

        let action = if config.enabled {
            let next_run = self.create_job(&config).await?;
            info!(
                frequency = %config.frequency,
                time_of_day = %config.time_of_day,
                next_run = %next_run,
                "Scheduled build reset"
            );
            if removed {
                ReconcileAction::Recreated { next_run }
            } else {
                ReconcileAction::Created { next_run }
            }
        } else if removed {
            info!("Scheduled builds disabled, job removed");
            ReconcileAction::Removed
        } else {
            ReconcileAction::Unchanged
        };

        Ok(self.record(action))
    }

    /// Create the job if it should exist and does not; remove it if disabled
    ///
    /// An existing job is left alone even if its cadence is stale; only
    /// `on_settings_changed` rebuilds.
    #[instrument(skip(self))]
    pub async fn self_heal(&self) -> Result<ReconcileAction, ScheduleError> {
        let config = self.load_config().await?;

        let action = if config.enabled {
            if self.scheduler.next_scheduled(SCHEDULED_BUILD_JOB).await?.is_some() {
                ReconcileAction::Unchanged
            } else {
                match self.create_job(&config).await {
                    Ok(next_run) => {
                        info!(next_run = %next_run, "Scheduled build restored");
                        ReconcileAction::Created { next_run }
                    }
                    // Lost a race with another request creating the same job
                    Err(ScheduleError::AlreadyScheduled(_)) => ReconcileAction::Unchanged,
                    Err(e) => return Err(e),
                }
            }
        } else if self.clear_job().await? {
            info!("Stale scheduled build removed");
            ReconcileAction::Removed
        } else {
            ReconcileAction::Unchanged
        };

        Ok(self.record(action))
    }

    /// Remove the job unconditionally
    #[instrument(skip(self))]
    pub async fn deactivate(&self) -> Result<ReconcileAction, ScheduleError> {
        let action = if self.clear_job().await? {
            info!("Scheduled build removed on deactivation");
            ReconcileAction::Removed
        } else {
            ReconcileAction::Unchanged
        };
        Ok(self.record(action))
    }

    /// Fire a deploy for the recurring job; the outcome never affects the schedule
    #[instrument(skip(self))]
    pub async fn on_job_fired(&self) {
        match self.dispatcher.fire_deploy(TriggerSource::Scheduled).await {
            Ok(outcome) => debug!(outcome = ?outcome, "Scheduled deploy finished"),
            Err(e) => warn!(error = %e, "Scheduled deploy failed"),
        }
    }
}

#[async_trait]
impl JobHandler for ScheduleReconciler {
    async fn on_fire(&self, _job: &ScheduledJob) {
        self.on_job_fired().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MockDispatchClient;
    use crate::models::Cadence;
    use crate::scheduler::InMemoryJobScheduler;
    use crate::store::InMemoryOptionStore;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
    }

    struct Fixture {
        store: Arc<InMemoryOptionStore>,
        scheduler: Arc<InMemoryJobScheduler>,
        reconciler: ScheduleReconciler,
    }

    fn fixture(client: MockDispatchClient) -> Fixture {
        let store = Arc::new(InMemoryOptionStore::new());
        let scheduler = Arc::new(InMemoryJobScheduler::new());
        let dispatcher = Arc::new(DeployDispatcher::new(
            store.clone(),
            Arc::new(client),
            "https://api.github.com",
        ));
        let reconciler =
            ScheduleReconciler::new(store.clone(), scheduler.clone(), dispatcher, chrono_tz::UTC)
                .with_clock(fixed_now);
        Fixture {
            store,
            scheduler,
            reconciler,
        }
    }

    async fn set(store: &InMemoryOptionStore, key: OptionKey, value: &str) {
        store.set(key, value.to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_config_defaults() {
        let f = fixture(MockDispatchClient::new());
        let config = f.reconciler.load_config().await.unwrap();
        assert!(!config.enabled);
        assert_eq!(config.frequency, Frequency::Weekly);
        assert_eq!(config.time_of_day, NaiveTime::MIN);
    }

    #[tokio::test]
    async fn test_invalid_stored_time_falls_back_to_midnight() {
        let f = fixture(MockDispatchClient::new());
        set(&f.store, OptionKey::SelectTimeBuild, "half past nine").await;
        let config = f.reconciler.load_config().await.unwrap();
        assert_eq!(config.time_of_day, NaiveTime::MIN);
    }

    #[tokio::test]
    async fn test_settings_change_switches_cadence() {
        let f = fixture(MockDispatchClient::new());
        set(&f.store, OptionKey::EnableScheduledBuilds, "enable").await;
        set(&f.store, OptionKey::SelectScheduleBuilds, "weekly").await;
        set(&f.store, OptionKey::SelectTimeBuild, "10:00").await;

        let first = f.reconciler.on_settings_changed().await.unwrap();
        assert_eq!(
            first,
            ReconcileAction::Created {
                next_run: Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap()
            }
        );

        set(&f.store, OptionKey::SelectScheduleBuilds, "daily").await;
        let second = f.reconciler.on_settings_changed().await.unwrap();
        assert!(matches!(second, ReconcileAction::Recreated { .. }));

        let jobs = f.scheduler.jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].cadence, Cadence::Daily);
    }

    #[tokio::test]
    async fn test_settings_change_disable_removes_job() {
        let f = fixture(MockDispatchClient::new());
        set(&f.store, OptionKey::EnableScheduledBuilds, "enable").await;
        f.reconciler.on_settings_changed().await.unwrap();

        set(&f.store, OptionKey::EnableScheduledBuilds, "").await;
        assert_eq!(
            f.reconciler.on_settings_changed().await.unwrap(),
            ReconcileAction::Removed
        );
        assert!(f.scheduler.jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_self_heal_is_idempotent() {
        let f = fixture(MockDispatchClient::new());
        set(&f.store, OptionKey::EnableScheduledBuilds, "enable").await;

        assert!(matches!(
            f.reconciler.self_heal().await.unwrap(),
            ReconcileAction::Created { .. }
        ));
        assert_eq!(f.reconciler.self_heal().await.unwrap(), ReconcileAction::Unchanged);
        assert_eq!(f.scheduler.jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_self_heal_keeps_stale_job() {
        let f = fixture(MockDispatchClient::new());
        set(&f.store, OptionKey::EnableScheduledBuilds, "enable").await;
        set(&f.store, OptionKey::SelectScheduleBuilds, "weekly").await;
        f.reconciler.on_settings_changed().await.unwrap();

        // Written without the settings-changed hook
        set(&f.store, OptionKey::SelectScheduleBuilds, "monthly").await;
        assert_eq!(f.reconciler.self_heal().await.unwrap(), ReconcileAction::Unchanged);
        assert_eq!(
            f.reconciler.current_job().await.unwrap().unwrap().cadence,
            Cadence::Weekly
        );
    }

    #[tokio::test]
    async fn test_self_heal_removes_job_when_disabled() {
        let f = fixture(MockDispatchClient::new());
        f.scheduler
            .schedule_recurring(SCHEDULED_BUILD_JOB, fixed_now(), Cadence::Daily)
            .await
            .unwrap();
        assert_eq!(f.reconciler.self_heal().await.unwrap(), ReconcileAction::Removed);
        assert!(f.scheduler.jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deactivate_without_job_is_noop() {
        let f = fixture(MockDispatchClient::new());
        assert_eq!(f.reconciler.deactivate().await.unwrap(), ReconcileAction::Unchanged);
    }

    #[tokio::test]
    async fn test_job_fire_ignores_dispatch_failure() {
        let mut client = MockDispatchClient::new();
        client.expect_send().times(1).returning(|_| {
            Err(crate::errors::DispatchError::Status {
                status: 500,
                body: String::new(),
            })
        });
        let f = fixture(client);
        set(&f.store, OptionKey::WebhookAddress, "https://example.test/wf").await;
        set(&f.store, OptionKey::GithubAccessToken, "secret").await;
        set(&f.store, OptionKey::EnableScheduledBuilds, "enable").await;
        f.reconciler.on_settings_changed().await.unwrap();

        f.reconciler.on_job_fired().await;
        assert_eq!(f.scheduler.jobs().await.unwrap().len(), 1);
    }
}
