use clap::Parser;
use collector_core::{CollectorService, Config, OpenMeteoSource};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "collector", version, about = "Weather telemetry collector")]
pub struct Cli {
    /// Path to the TOML config file; defaults to the platform config dir.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run a single collection cycle and exit instead of looping.
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        init_logging();

        let config = Config::load(self.config)?;
        banner(&config);

        let source = OpenMeteoSource::new();
        let service = CollectorService::new(config, Box::new(source));

        if self.once {
            service.run_once().await
        } else {
            service.run().await
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn banner(config: &Config) {
    info!("Collector service - weather telemetry collection");
    info!(url = %config.broker.url, queue = %config.broker.queue, "Message broker: RabbitMQ");
    info!(
        interval_secs = config.collection.interval_secs,
        interval_minutes = config.collection.interval_secs as f64 / 60.0,
        "Collection interval"
    );
    info!(
        name = %config.location.name,
        latitude = config.location.latitude,
        longitude = config.location.longitude,
        "Location"
    );
}
