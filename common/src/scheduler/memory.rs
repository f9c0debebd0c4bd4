// In-process job registry

use super::JobScheduler;
use crate::errors::ScheduleError;
use crate::models::{Cadence, ScheduledJob};
use crate::schedule::advance_past;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Job scheduler keeping its jobs in memory
#[derive(Debug, Default)]
pub struct InMemoryJobScheduler {
    jobs: RwLock<HashMap<String, ScheduledJob>>,
}

impl InMemoryJobScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobScheduler for InMemoryJobScheduler {
    #[instrument(skip(self))]
    async fn schedule_recurring(
        &self,
        name: &str,
        first_run: DateTime<Utc>,
        cadence: Cadence,
    ) -> Result<(), ScheduleError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(name) {
            return Err(ScheduleError::AlreadyScheduled(name.to_string()));
        }
        jobs.insert(
            name.to_string(),
            ScheduledJob {
                name: name.to_string(),
                next_run: first_run,
                cadence,
            },
        );
        info!(next_run = %first_run, cadence = cadence.name(), "Recurring job scheduled");
        Ok(())
    }

    async fn next_scheduled(&self, name: &str) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        Ok(self.jobs.read().await.get(name).map(|job| job.next_run))
    }

    #[instrument(skip(self))]
    async fn unschedule(&self, name: &str, timestamp: DateTime<Utc>) -> Result<bool, ScheduleError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get(name) {
            Some(job) if job.next_run == timestamp => {
                jobs.remove(name);
                info!("Recurring job unscheduled");
                Ok(true)
            }
            Some(job) => {
                debug!(next_run = %job.next_run, "Timestamp does not match scheduled run");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn job(&self, name: &str) -> Result<Option<ScheduledJob>, ScheduleError> {
        Ok(self.jobs.read().await.get(name).cloned())
    }

    async fn jobs(&self) -> Result<Vec<ScheduledJob>, ScheduleError> {
        let mut jobs: Vec<_> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, ScheduleError> {
        let mut due: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.next_run <= now)
            .cloned()
            .collect();
        due.sort_by_key(|job| job.next_run);
        Ok(due)
    }

    async fn advance(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        let mut jobs = self.jobs.write().await;
        Ok(jobs.get_mut(name).map(|job| {
            job.next_run = advance_past(job.next_run, job.cadence, now);
            job.next_run
        }))
    }
}
