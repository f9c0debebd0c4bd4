use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::self_heal_middleware;
use crate::state::AppState;

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Routes that see the recurring build restored before they run
    let healed_routes = Router::new()
        .route("/api/deploy", post(handlers::deploy::trigger_deploy))
        .route("/api/deploy/target", get(handlers::deploy::get_target))
        .route(
            "/api/settings",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        )
        .route("/api/schedule", get(handlers::schedule::get_schedule))
        .route(
            "/api/hooks/transition",
            post(handlers::hooks::post_transition),
        )
        .route(
            "/api/hooks/future-publish",
            post(handlers::hooks::future_publish),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            self_heal_middleware,
        ));

    // Liveness probes and deactivation never recreate the job
    let plain_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/hooks/deactivate", post(handlers::hooks::deactivate));

    Router::new()
        .merge(healed_routes)
        .merge(plain_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
