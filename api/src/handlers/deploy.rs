use axum::extract::State;
use common::models::{DispatchOutcome, TargetView, TriggerSource};

use crate::handlers::{ApiResult, SuccessResponse};
use crate::state::AppState;

/// Fire a deploy on demand
///
/// A target missing its URL or token is reported as `skipped`, not as an error.
#[tracing::instrument(skip(state))]
pub async fn trigger_deploy(State(state): State<AppState>) -> ApiResult<DispatchOutcome> {
    let outcome = state.dispatcher.fire_deploy(TriggerSource::Manual).await?;
    tracing::info!(outcome = ?outcome, "Manual deploy handled");
    Ok(SuccessResponse::new(outcome))
}

/// Show where a deploy would be sent
#[tracing::instrument(skip(state))]
pub async fn get_target(State(state): State<AppState>) -> ApiResult<TargetView> {
    let view = state.dispatcher.describe_target().await?;
    Ok(SuccessResponse::new(view))
}
