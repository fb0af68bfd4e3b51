use serde::Serialize;
use serde_json::{Number, Value};

/// Canonical weather event published downstream.
///
/// Built once per collection cycle by [`crate::normalize::normalize`],
/// serialized to JSON and handed to the broker, then discarded. The schema
/// is stable regardless of the upstream provider's raw shape.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedEvent {
    /// UTC, ISO-8601 with second precision and a trailing `Z`.
    pub timestamp: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees Celsius, rounded to 1 decimal.
    pub temperature: f64,
    /// Degrees Celsius, rounded to 1 decimal. Falls back to `temperature`
    /// when the provider omits apparent temperature.
    pub feels_like: f64,
    /// Relative humidity in percent, passed through unrounded and keeping
    /// the provider's integer-or-float representation.
    pub humidity: Number,
    /// Rounded to 1 decimal.
    pub wind_speed: f64,
    /// Condition label from the configured code table, or `unknown`.
    pub condition: String,
    /// Always in [0.0, 1.0], rounded to 2 decimals.
    pub rain_probability: f64,
    /// The unprocessed provider current-conditions object, kept for audit.
    pub raw: Value,
}
