use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::Location;

use super::{FetchError, ObservationSource};

pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Current-condition fields requested from the forecast endpoint.
const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m,\
                              weather_code,apparent_temperature,precipitation_probability";

/// Observation source backed by the free Open-Meteo forecast API.
/// No API key required.
#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    base_url: String,
    http: Client,
}

impl OpenMeteoSource {
    pub fn new() -> Self {
        Self::with_base_url(OPEN_METEO_BASE_URL.to_string())
    }

    /// Point the source at a different endpoint, e.g. a mock server in tests.
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            base_url,
            http: Client::new(),
        }
    }
}

impl Default for OpenMeteoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObservationSource for OpenMeteoSource {
    async fn fetch_current(&self, location: &Location) -> Result<Value, FetchError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("timezone", "America/Sao_Paulo".to_string()),
                ("forecast_days", "1".to_string()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        let parsed: Value = serde_json::from_str(&body)?;

        // A body without `current` normalizes to an all-defaults event
        // rather than failing the cycle.
        Ok(parsed
            .get("current")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    // Back up to a char boundary so multibyte bodies never split mid-char.
    let mut cut = MAX;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &body[..cut])
}
