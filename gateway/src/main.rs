mod config;

use clap::Parser;
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use news_router::errors::NewsRouterError;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "gateway", about = "Edge gateway in front of the news search API")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum MainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not install metrics exporter: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    NewsRouter(#[from] NewsRouterError),
}

fn main() -> Result<(), MainError> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;

    let logging = config.logging.clone().unwrap_or_default();
    let _sentry = init_sentry(&logging);
    init_tracing(&logging);

    if let Some(metrics) = &config.metrics {
        init_metrics(metrics)?;
    }

    tracing::info!(config = %cli.config.display(), "Starting news gateway");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(news_router::run(config.news_router))?;
    Ok(())
}

fn init_sentry(logging: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = logging.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let sentry_layer = logging
        .sentry_dsn
        .is_some()
        .then(sentry::integrations::tracing::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(sentry_layer)
        .init();
}

fn init_metrics(config: &MetricsConfig) -> Result<(), MainError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some("news_gateway"))
        .map_err(|e| MainError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| MainError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(news_router::metrics_defs::ALL_METRICS);
    Ok(())
}
