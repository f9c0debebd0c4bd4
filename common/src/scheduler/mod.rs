// Job scheduler: named recurring jobs and the loop that fires them

pub mod engine;
pub mod memory;

pub use engine::{JobHandler, Scheduler, SchedulerEngine, SchedulerEngineConfig};
pub use memory::InMemoryJobScheduler;

use crate::errors::ScheduleError;
use crate::models::{Cadence, ScheduledJob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Recurring job registry
///
/// Jobs are addressed by a well-known name. At most one job exists per name.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Register a recurring job; fails if `name` is already scheduled
    async fn schedule_recurring(
        &self,
        name: &str,
        first_run: DateTime<Utc>,
        cadence: Cadence,
    ) -> Result<(), ScheduleError>;

    /// Next fire time of the named job, if it exists
    async fn next_scheduled(&self, name: &str) -> Result<Option<DateTime<Utc>>, ScheduleError>;

    /// Remove the named job if its next fire time equals `timestamp`
    ///
    /// Returns whether a job was removed.
    async fn unschedule(&self, name: &str, timestamp: DateTime<Utc>) -> Result<bool, ScheduleError>;

    async fn job(&self, name: &str) -> Result<Option<ScheduledJob>, ScheduleError>;

    async fn jobs(&self) -> Result<Vec<ScheduledJob>, ScheduleError>;

    /// Jobs whose next fire time is at or before `now`
    async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, ScheduleError>;

    /// Move the named job past `now` by whole cadence steps
    async fn advance(&self, name: &str, now: DateTime<Utc>)
        -> Result<Option<DateTime<Utc>>, ScheduleError>;
}
