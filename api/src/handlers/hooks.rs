// Host lifecycle events: post status changes, scheduled posts going live,
// and plugin deactivation

use axum::{extract::State, Json};
use common::models::PostStatus;
use common::reconcile::ReconcileAction;
use serde::{Deserialize, Serialize};

use crate::handlers::{ApiResult, SuccessResponse};
use crate::state::AppState;

/// A post moved from one status to another
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub old_status: PostStatus,
    pub new_status: PostStatus,
    /// Set when the change came through the host's REST API
    #[serde(default)]
    pub rest_request: bool,
}

/// A future-dated post reached its publish time
#[derive(Debug, Deserialize)]
pub struct FuturePublishRequest {
    pub post_id: u64,
}

#[derive(Debug, Serialize)]
pub struct HookResponse {
    /// Whether a deploy was attempted
    pub fired: bool,
}

#[tracing::instrument(skip(state))]
pub async fn post_transition(
    State(state): State<AppState>,
    Json(req): Json<TransitionRequest>,
) -> ApiResult<HookResponse> {
    let fired = state
        .trigger
        .on_transition(&req.old_status, &req.new_status, req.rest_request)
        .await?;
    Ok(SuccessResponse::new(HookResponse { fired }))
}

#[tracing::instrument(skip(state))]
pub async fn future_publish(
    State(state): State<AppState>,
    Json(req): Json<FuturePublishRequest>,
) -> ApiResult<HookResponse> {
    let fired = state.trigger.on_future_post_published(req.post_id).await?;
    Ok(SuccessResponse::new(HookResponse { fired }))
}

/// Remove the recurring build when the integration is switched off
#[tracing::instrument(skip(state))]
pub async fn deactivate(State(state): State<AppState>) -> ApiResult<ReconcileAction> {
    let action = state.reconciler.deactivate().await?;
    Ok(SuccessResponse::new(action))
}
