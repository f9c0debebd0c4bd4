use axum::extract::State;
use chrono::{DateTime, Utc};
use common::models::{Cadence, Frequency, ScheduledJob};
use serde::Serialize;

use crate::handlers::{ApiResult, SuccessResponse};
use crate::state::AppState;

/// Recurrence registered with the job scheduler
#[derive(Debug, Serialize)]
pub struct CadenceInfo {
    pub name: &'static str,
    pub display: &'static str,
    pub interval_seconds: i64,
}

impl From<Cadence> for CadenceInfo {
    fn from(cadence: Cadence) -> Self {
        Self {
            name: cadence.name(),
            display: cadence.display(),
            interval_seconds: cadence.interval_seconds(),
        }
    }
}

/// Scheduled build settings together with the live job
#[derive(Debug, Serialize)]
pub struct ScheduleView {
    pub enabled: bool,
    pub frequency: Frequency,
    pub time_of_day: String,
    pub timezone: String,
    pub next_run: Option<DateTime<Utc>>,
    pub job: Option<ScheduledJob>,
    pub cadences: Vec<CadenceInfo>,
}

/// Show the schedule settings and when the next build fires
#[tracing::instrument(skip(state))]
pub async fn get_schedule(State(state): State<AppState>) -> ApiResult<ScheduleView> {
    let config = state.reconciler.load_config().await?;
    let job = state.reconciler.current_job().await?;

    Ok(SuccessResponse::new(ScheduleView {
        enabled: config.enabled,
        frequency: config.frequency,
        time_of_day: config.time_of_day.format("%H:%M").to_string(),
        timezone: state.config.scheduler.timezone.clone(),
        next_run: job.as_ref().map(|j| j.next_run),
        job,
        cadences: Cadence::ALL.into_iter().map(CadenceInfo::from).collect(),
    }))
}
