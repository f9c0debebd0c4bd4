// Telemetry module for structured logging, metrics, and tracing

use crate::models::TriggerSource;
use anyhow::Result;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "workflow-deploy";

/// Initialize structured logging with JSON formatting and trace context
///
/// Sets up the tracing subscriber with:
/// - JSON lines carrying the current span and its parents
/// - A filter from `RUST_LOG`, falling back to `log_level`
/// - OTLP span export when `tracing_endpoint` is set
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    // Dispatch and reconcile spans nest under the request span
    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized"
    );

    Ok(())
}

/// Initialize OpenTelemetry tracer with OTLP exporter
///
/// Spans go to the collector at `endpoint` over gRPC through a batch
/// exporter on the tokio runtime. Every span is sampled and tagged with
/// the service name and crate version.
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", SERVICE_NAME),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    let tracer = tracer_provider.tracer(SERVICE_NAME);

    tracing::info!(endpoint = endpoint, "OpenTelemetry tracer initialized");

    Ok(tracer)
}

/// Flush remaining spans on shutdown
///
/// A no-op when no tracer provider was installed.
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Initialize Prometheus metrics exporter and describe deploy counters
///
/// Serves the scrape endpoint on `0.0.0.0:<metrics_port>`. Counters:
/// - `deploy_dispatched_total`, `deploy_skipped_total`, `deploy_failed_total`
///   labelled by trigger `source`
/// - `schedule_reconciled_total` labelled by reconcile `action`
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "deploy_dispatched_total",
        "Workflow dispatches accepted by the remote endpoint"
    );
    describe_counter!(
        "deploy_skipped_total",
        "Deploys skipped because the target was not configured"
    );
    describe_counter!("deploy_failed_total", "Workflow dispatches that failed in transport");
    describe_counter!(
        "schedule_reconciled_total",
        "Schedule reconciliations that changed the recurring job"
    );

    tracing::info!(metrics_port = metrics_port, "Prometheus metrics exporter initialized");

    Ok(())
}

#[inline]
pub fn record_deploy_dispatched(source: TriggerSource) {
    counter!("deploy_dispatched_total", "source" => source.as_str()).increment(1);
}

#[inline]
pub fn record_deploy_skipped(source: TriggerSource) {
    counter!("deploy_skipped_total", "source" => source.as_str()).increment(1);
}

#[inline]
pub fn record_deploy_failed(source: TriggerSource) {
    counter!("deploy_failed_total", "source" => source.as_str()).increment(1);
}

#[inline]
pub fn record_schedule_reconciled(action: &'static str) {
    counter!("schedule_reconciled_total", "action" => action).increment(1);
}
