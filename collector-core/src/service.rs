use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::broker::QueuePublisher;
use crate::config::Config;
use crate::normalize::normalize;
use crate::provider::ObservationSource;

/// Cadence of the advisory liveness probe, independent of the collection
/// interval. Keeps the connection warm between cycles that may be spaced
/// an hour apart.
const LIVENESS_INTERVAL: Duration = Duration::from_secs(20);

/// Outcome of one collection cycle. Advisory: the run loop logs it and
/// moves on, it never propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published,
    /// Fetch failed; the publish step was skipped entirely.
    FetchFailed,
    /// Fetch and normalization succeeded but the send failed; the event
    /// is dropped (no local buffer, no in-cycle reconnect).
    PublishFailed,
}

/// Drives the periodic fetch-normalize-publish cycle and the liveness probe.
///
/// Everything runs on one task: `select!` advances one arm at a time, so the
/// main and liveness cycles interleave but never overlap, and the publisher
/// keeps a single owner.
pub struct CollectorService {
    config: Config,
    source: Box<dyn ObservationSource>,
    publisher: QueuePublisher,
}

impl CollectorService {
    pub fn new(config: Config, source: Box<dyn ObservationSource>) -> Self {
        let publisher = QueuePublisher::new(&config.broker.url, &config.broker.queue);
        Self {
            config,
            source,
            publisher,
        }
    }

    /// Run until interrupted.
    ///
    /// Connects once up front; a failed initial connect aborts before the
    /// loop is entered. The first collection cycle runs immediately. On
    /// interrupt the loop unwinds and the connection is closed exactly once.
    pub async fn run(mut self) -> Result<()> {
        self.publisher
            .connect()
            .await
            .context("Initial broker connect failed")?;

        let mut collect = interval(Duration::from_secs(self.config.collection.interval_secs));
        collect.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut liveness = interval(LIVENESS_INTERVAL);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!(
            interval_secs = self.config.collection.interval_secs,
            "Collector started; waiting for scheduled cycles"
        );

        loop {
            tokio::select! {
                _ = collect.tick() => {
                    self.collect_and_publish().await;
                }
                _ = liveness.tick() => {
                    if !self.publisher.probe_liveness() {
                        warn!("Liveness probe found the broker connection dead");
                    }
                }
                _ = &mut ctrl_c => {
                    info!("Interrupt received, shutting down");
                    break;
                }
            }
        }

        self.publisher.close().await;
        info!("Collector stopped");
        Ok(())
    }

    /// Run a single connect-collect-close cycle, then return.
    pub async fn run_once(mut self) -> Result<()> {
        self.publisher
            .connect()
            .await
            .context("Initial broker connect failed")?;

        self.collect_and_publish().await;
        self.publisher.close().await;
        Ok(())
    }

    /// One collection cycle: fetch, normalize, publish.
    ///
    /// A failed fetch skips the publish step; a cycle with no data produces
    /// no message, never a placeholder.
    pub async fn collect_and_publish(&mut self) -> CycleOutcome {
        info!(location = %self.config.location.name, "Starting collection cycle");

        let current = match self.source.fetch_current(&self.config.location).await {
            Ok(current) => current,
            Err(err) => {
                warn!(error = %err, "Fetch failed; skipping publish for this cycle");
                return CycleOutcome::FetchFailed;
            }
        };

        let event = normalize(&current, &self.config.location, &self.config.conditions);

        match self.publisher.publish(&event).await {
            Ok(()) => {
                info!(
                    location = %event.location,
                    condition = %event.condition,
                    "Collected and published"
                );
                CycleOutcome::Published
            }
            Err(err) => {
                error!(error = %err, "Publish failed; event dropped");
                CycleOutcome::PublishFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Location;
    use crate::provider::FetchError;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    #[derive(Debug)]
    struct StaticSource {
        fail: bool,
    }

    #[async_trait]
    impl ObservationSource for StaticSource {
        async fn fetch_current(&self, _location: &Location) -> Result<Value, FetchError> {
            if self.fail {
                Err(FetchError::Status {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    body: "upstream down".to_string(),
                })
            } else {
                Ok(json!({
                    "temperature_2m": [27.5],
                    "apparent_temperature": [28.2],
                    "relative_humidity_2m": [70],
                    "wind_speed_10m": [12.3],
                    "weather_code": [3],
                    "precipitation_probability": [40],
                }))
            }
        }
    }

    #[tokio::test]
    async fn failed_fetch_skips_the_publish_step() {
        let mut service =
            CollectorService::new(Config::default(), Box::new(StaticSource { fail: true }));

        let outcome = service.collect_and_publish().await;

        // If the cycle had reached the publisher it would have reported
        // PublishFailed, since nothing is connected.
        assert_eq!(outcome, CycleOutcome::FetchFailed);
    }

    #[tokio::test]
    async fn publish_failure_is_absorbed_as_an_outcome() {
        let mut service =
            CollectorService::new(Config::default(), Box::new(StaticSource { fail: false }));

        // Publisher was never connected; the cycle must degrade to an
        // outcome instead of panicking.
        let outcome = service.collect_and_publish().await;

        assert_eq!(outcome, CycleOutcome::PublishFailed);
    }
}
