use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Restore the recurring build job before handling any request
///
/// Reconciliation failures are logged and never block the request.
#[tracing::instrument(skip(state, req, next))]
pub async fn self_heal_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if let Err(e) = state.reconciler.self_heal().await {
        tracing::warn!(error = %e, "Scheduled build self-heal failed");
    }
    next.run(req).await
}
