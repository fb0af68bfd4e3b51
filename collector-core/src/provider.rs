use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use thiserror::Error;

use crate::config::Location;

pub mod open_meteo;

/// Errors at the fetch boundary. A failed fetch ends the cycle; it never
/// reaches the broker.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to reach the weather provider: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Weather provider request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse weather provider JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of raw current-conditions observations.
#[async_trait]
pub trait ObservationSource: Send + Sync + Debug {
    /// Fetch the provider's raw `current` block for the given location.
    ///
    /// The returned value keeps the provider's shape (fields may be scalars
    /// or single-element sequences); normalization happens downstream.
    async fn fetch_current(&self, location: &Location) -> Result<Value, FetchError>;
}
