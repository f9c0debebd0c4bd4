// Scheduler engine: polls the job registry and fires due jobs

use super::JobScheduler;
use crate::errors::ScheduleError;
use crate::models::ScheduledJob;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the scheduler engine
#[derive(Debug, Clone)]
pub struct SchedulerEngineConfig {
    /// How often to poll for due jobs (in seconds)
    pub poll_interval_seconds: u64,
}

impl Default for SchedulerEngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 30,
        }
    }
}

/// Callback invoked when a named job fires
///
/// Handlers own their error reporting; the engine only needs to know the job
/// ran so it can move on.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn on_fire(&self, job: &ScheduledJob);
}

/// Scheduler loop operations
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Start the polling loop; returns once `stop` is called
    async fn start(&self) -> Result<(), ScheduleError>;

    /// Signal the polling loop to stop
    async fn stop(&self) -> Result<(), ScheduleError>;

    /// Fire every job due at `now`, returning how many fired
    async fn process_due_jobs(&self, now: DateTime<Utc>) -> Result<usize, ScheduleError>;
}

/// Polling scheduler engine
pub struct SchedulerEngine {
    config: SchedulerEngineConfig,
    jobs: Arc<dyn JobScheduler>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl SchedulerEngine {
    pub fn new(config: SchedulerEngineConfig, jobs: Arc<dyn JobScheduler>) -> Self {
        let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel(1);

        Self {
            config,
            jobs,
            handlers: HashMap::new(),
            shutdown_tx,
        }
    }

    /// Bind a handler to a job name
    pub fn with_handler(mut self, job_name: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(job_name.into(), handler);
        self
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Advance one due job and run its handler
    ///
    /// The job is advanced before the handler runs, so a slow or failing
    /// handler never causes the same run to fire twice.
    #[instrument(skip(self, job), fields(job_name = %job.name, next_run = %job.next_run))]
    async fn fire_job(&self, job: &ScheduledJob, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        let next = self.jobs.advance(&job.name, now).await?;
        debug!(next_run = ?next, "Job advanced");

        match self.handlers.get(&job.name) {
            Some(handler) => {
                handler.on_fire(job).await;
                info!("Job fired");
            }
            None => warn!("No handler registered for job, skipping"),
        }

        Ok(())
    }
}

#[async_trait]
impl Scheduler for SchedulerEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), ScheduleError> {
        info!(
            poll_interval_seconds = self.config.poll_interval_seconds,
            "Starting scheduler engine"
        );

        let mut poll_interval = interval(Duration::from_secs(self.config.poll_interval_seconds));
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown_receiver();

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    match self.process_due_jobs(Utc::now()).await {
                        Ok(0) => debug!("No jobs due"),
                        Ok(count) => info!(jobs_fired = count, "Processed due jobs"),
                        Err(e) => error!(error = %e, "Error processing due jobs"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        info!("Scheduler engine stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), ScheduleError> {
        info!("Stopping scheduler engine");
        // No receivers just means the loop is not running
        let _ = self.shutdown_tx.send(());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn process_due_jobs(&self, now: DateTime<Utc>) -> Result<usize, ScheduleError> {
        let due = self.jobs.due_jobs(now).await?;
        debug!(job_count = due.len(), "Found due jobs");

        let mut fired = 0;
        for job in &due {
            match self.fire_job(job, now).await {
                Ok(()) => fired += 1,
                Err(e) => {
                    error!(job_name = %job.name, error = %e, "Failed to fire job");
                }
            }
        }

        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cadence;
    use crate::scheduler::InMemoryJobScheduler;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        fired: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn on_fire(&self, _job: &ScheduledJob) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerEngineConfig::default();
        assert_eq!(config.poll_interval_seconds, 30);
    }

    #[tokio::test]
    async fn test_due_job_fires_once_per_poll() {
        let jobs = Arc::new(InMemoryJobScheduler::new());
        jobs.schedule_recurring("build", at(10), Cadence::Daily)
            .await
            .unwrap();
        let handler = Arc::new(CountingHandler::default());
        let engine = SchedulerEngine::new(SchedulerEngineConfig::default(), jobs.clone())
            .with_handler("build", handler.clone());

        assert_eq!(engine.process_due_jobs(at(9)).await.unwrap(), 0);
        assert_eq!(engine.process_due_jobs(at(11)).await.unwrap(), 1);
        assert_eq!(engine.process_due_jobs(at(12)).await.unwrap(), 0);
        assert_eq!(handler.fired.load(Ordering::SeqCst), 1);
        assert!(jobs.next_scheduled("build").await.unwrap().unwrap() > at(12));
    }

    #[tokio::test]
    async fn test_job_without_handler_still_advances() {
        let jobs = Arc::new(InMemoryJobScheduler::new());
        jobs.schedule_recurring("orphan", at(10), Cadence::Hourly)
            .await
            .unwrap();
        let engine = SchedulerEngine::new(SchedulerEngineConfig::default(), jobs.clone());

        assert_eq!(engine.process_due_jobs(at(10)).await.unwrap(), 1);
        assert_eq!(jobs.next_scheduled("orphan").await.unwrap(), Some(at(11)));
    }

    #[tokio::test]
    async fn test_stop_ends_start_loop() {
        let jobs = Arc::new(InMemoryJobScheduler::new());
        let engine = Arc::new(SchedulerEngine::new(
            SchedulerEngineConfig {
                poll_interval_seconds: 1,
            },
            jobs,
        ));

        let runner = engine.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.stop().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler loop did not stop");
        assert!(result.unwrap().is_ok());
    }
}
