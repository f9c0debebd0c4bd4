use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

use api::routes;
use api::state::AppState;
use common::config::Settings;
use common::dispatch::ReqwestDispatchClient;
use common::reconcile::SCHEDULED_BUILD_JOB;
use common::scheduler::{InMemoryJobScheduler, Scheduler, SchedulerEngine, SchedulerEngineConfig};
use common::store::FileOptionStore;
use common::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Settings::load()?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &config.observability.log_level,
        config.observability.tracing_endpoint.as_deref(),
    )?;
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        store = %config.store.path,
        timezone = %config.scheduler.timezone,
        "Configuration loaded"
    );

    if let Some(port) = config.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    let store = Arc::new(FileOptionStore::new(&config.store.path));
    let jobs = Arc::new(InMemoryJobScheduler::new());
    let client = Arc::new(ReqwestDispatchClient::new(
        config.http.timeout_seconds,
        &config.http.user_agent,
    )?);

    let state = AppState::new(config.clone(), store, jobs.clone(), client)?;

    // Jobs do not survive a restart; restore the recurring build up front
    match state.reconciler.self_heal().await {
        Ok(action) => tracing::info!(action = ?action, "Startup schedule check complete"),
        Err(e) => tracing::warn!(error = %e, "Startup schedule check failed"),
    }

    let engine = Arc::new(
        SchedulerEngine::new(
            SchedulerEngineConfig {
                poll_interval_seconds: config.scheduler.poll_interval_seconds,
            },
            jobs,
        )
        .with_handler(SCHEDULED_BUILD_JOB, state.reconciler.clone()),
    );
    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.start().await {
                tracing::error!(error = %e, "Scheduler engine error");
            }
        })
    };

    // Create router
    let app = routes::create_router(state);

    // Start server
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.stop().await?;
    if let Err(e) = engine_task.await {
        tracing::error!(error = %e, "Scheduler task panicked");
    }

    tracing::info!("Deploy service stopped");
    telemetry::shutdown_tracer();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}
