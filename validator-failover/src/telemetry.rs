//! Logging, error reporting and metrics setup for one process.

use metrics_exporter_statsd::StatsdBuilder;
use sentry::ClientInitGuard;
use shared::metrics_defs::describe_all;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::CliError;
use crate::config::{CommonConfig, LoggingConfig, MetricsConfig};

const METRICS_PREFIX: &str = "validator_failover";

/// Installs logging and metrics. The returned guard flushes Sentry on drop.
pub fn init(common: &CommonConfig) -> Result<Option<ClientInitGuard>, CliError> {
    let guard = init_logging(common.logging.as_ref())?;
    if let Some(metrics) = &common.metrics {
        init_metrics(metrics)?;
    }
    Ok(guard)
}

fn init_logging(config: Option<&LoggingConfig>) -> Result<Option<ClientInitGuard>, CliError> {
    let level = config.map_or("info", |c| c.level.as_str());

    let guard = match config.and_then(|c| c.sentry_dsn.as_deref()) {
        Some(dsn) => Some(sentry::init(sentry::ClientOptions {
            dsn: Some(dsn.parse()?),
            release: sentry::release_name!(),
            ..Default::default()
        })),
        None => None,
    };
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    // stdout carries the command output
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_layer)
        .try_init()
        .map_err(|e| CliError::Telemetry(e.to_string()))?;

    Ok(guard)
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Telemetry(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Telemetry(e.to_string()))?;

    describe_all(failover::metrics_defs::ALL_METRICS);
    describe_all(reconciler::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "statsd metrics enabled"
    );
    Ok(())
}
