use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties,
    options::{BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::NormalizedEvent;

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HEARTBEAT_SECS: u64 = 30;

/// Errors at the broker boundary, split by stage so the caller can tell a
/// failed connect from a failed send without parsing log output.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Not connected to the broker")]
    NotConnected,

    #[error("Broker connect failed after {attempts} attempts: {reason}")]
    Connect { attempts: u32, reason: String },

    #[error("Publish failed: {0}")]
    Publish(#[from] lapin::Error),

    #[error("Event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Owner of the single connection and channel to the message broker.
///
/// The publisher is the sole mutator of this state; the run loop drives it
/// from one task, so no locking is needed. Observable states are only
/// disconnected and connected: [`QueuePublisher::connect`] is atomic from
/// the caller's perspective.
pub struct QueuePublisher {
    uri: String,
    queue_name: String,
    connection: Option<Connection>,
    channel: Option<Channel>,
}

impl QueuePublisher {
    /// Build a disconnected publisher. A heartbeat interval is negotiated
    /// via the URI so silent peer death is detected during long idle gaps.
    pub fn new(url: &str, queue_name: &str) -> Self {
        Self {
            uri: uri_with_heartbeat(url, HEARTBEAT_SECS),
            queue_name: queue_name.to_string(),
            connection: None,
            channel: None,
        }
    }

    /// Connect to the broker and declare the durable queue.
    ///
    /// Idempotent: any prior connection is closed first. Attempts are
    /// bounded (3 tries, fixed 2 s delay, 10 s timeout each); the last
    /// failure is carried in the returned error.
    pub async fn connect(&mut self) -> Result<(), BrokerError> {
        self.close().await;

        let mut last_failure = String::new();
        for attempt in 1..=CONNECT_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }

            match self.try_connect().await {
                Ok(()) => {
                    info!(queue = %self.queue_name, "Connected to the broker");
                    return Ok(());
                }
                Err(reason) => {
                    warn!(attempt, error = %reason, "Broker connect attempt failed");
                    last_failure = reason;
                }
            }
        }

        Err(BrokerError::Connect {
            attempts: CONNECT_ATTEMPTS,
            reason: last_failure,
        })
    }

    async fn try_connect(&mut self) -> Result<(), String> {
        let connection = tokio::time::timeout(
            CONNECT_TIMEOUT,
            Connection::connect(
                &self.uri,
                ConnectionProperties::default().with_connection_name("weather-collector".into()),
            ),
        )
        .await
        .map_err(|_| format!("connect timed out after {}s", CONNECT_TIMEOUT.as_secs()))?
        .map_err(|e| format!("AMQP connection failed: {e}"))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| format!("Failed to create channel: {e}"))?;

        channel
            .queue_declare(
                &self.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| format!("Failed to declare queue: {e}"))?;

        self.connection = Some(connection);
        self.channel = Some(channel);
        Ok(())
    }

    /// Publish one event to the durable queue via the default exchange.
    ///
    /// Safe to call before `connect`; it reports [`BrokerError::NotConnected`]
    /// instead of sending. A connection lost mid-send surfaces as
    /// [`BrokerError::Publish`]. There is no automatic reconnect here; the
    /// event of a failed cycle is dropped (at-most-once per cycle).
    pub async fn publish(&mut self, event: &NormalizedEvent) -> Result<(), BrokerError> {
        let channel = self.channel.as_ref().ok_or(BrokerError::NotConnected)?;
        let body = serde_json::to_vec(event)?;

        // Re-declare before every send; idempotent on the broker side.
        channel
            .queue_declare(
                &self.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .basic_publish(
                "", // default exchange, routed by queue name
                &self.queue_name,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2) // persistent
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;

        debug!(
            queue = %self.queue_name,
            location = %event.location,
            timestamp = %event.timestamp,
            "Event published"
        );
        Ok(())
    }

    /// Non-blocking liveness check.
    ///
    /// lapin services heartbeat and close frames on its background reactor,
    /// so probing reduces to inspecting the handles' status; the caller is
    /// never blocked, even with an unresponsive broker.
    pub fn probe_liveness(&self) -> bool {
        let connection_open = self
            .connection
            .as_ref()
            .is_some_and(|c| c.status().connected());
        let channel_open = self.channel.as_ref().is_some_and(|c| c.status().connected());

        connection_open && channel_open
    }

    /// Tear down channel then connection and clear both handles.
    /// Idempotent and safe from the interrupt shutdown path.
    pub async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            let _ = channel.close(200, "shutdown").await;
        }
        if let Some(connection) = self.connection.take() {
            let _ = connection.close(200, "shutdown").await;
        }
    }
}

fn uri_with_heartbeat(uri: &str, secs: u64) -> String {
    if uri.contains("heartbeat=") {
        uri.to_string()
    } else if uri.contains('?') {
        format!("{uri}&heartbeat={secs}")
    } else {
        format!("{uri}?heartbeat={secs}")
    }
}
