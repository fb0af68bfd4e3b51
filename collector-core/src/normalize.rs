use chrono::{SecondsFormat, Utc};
use serde_json::{Number, Value};

use crate::config::{ConditionTable, Location};
use crate::model::NormalizedEvent;

/// Convert a provider-shaped `current` block into a [`NormalizedEvent`].
///
/// Infallible: missing or malformed metrics fall back to declared defaults,
/// unrecognized weather codes map to `unknown`. The only non-determinism is
/// the wall-clock timestamp captured at call time.
pub fn normalize(current: &Value, location: &Location, table: &ConditionTable) -> NormalizedEvent {
    let temperature = metric(current, "temperature_2m").unwrap_or(0.0);
    let feels_like = metric(current, "apparent_temperature").unwrap_or(temperature);
    let humidity = metric_number(current, "relative_humidity_2m");
    let wind_speed = metric(current, "wind_speed_10m").unwrap_or(0.0);
    let weather_code = metric(current, "weather_code").unwrap_or(0.0);
    let precipitation = metric(current, "precipitation_probability").unwrap_or(0.0);

    // The provider reports precipitation probability on a 0-100 scale;
    // anything above 1 is treated as a percentage.
    let rain_probability = if precipitation > 1.0 {
        precipitation / 100.0
    } else {
        precipitation
    };

    NormalizedEvent {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        location: location.name.clone(),
        latitude: location.latitude,
        longitude: location.longitude,
        temperature: round1(temperature),
        feels_like: round1(feels_like),
        humidity,
        wind_speed: round1(wind_speed),
        condition: table.label(weather_code as i64).to_string(),
        rain_probability: round2(rain_probability),
        raw: current.clone(),
    }
}

/// Extract a numeric metric that may be a bare scalar or a
/// single-element sequence.
fn metric(current: &Value, key: &str) -> Option<f64> {
    match current.get(key)? {
        Value::Array(items) => items.first().and_then(Value::as_f64),
        value => value.as_f64(),
    }
}

/// Like [`metric`], but preserves the provider's integer-or-float
/// representation. Missing or non-numeric values default to 0.
fn metric_number(current: &Value, key: &str) -> Number {
    let value = match current.get(key) {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };

    match value {
        Some(Value::Number(n)) => n.clone(),
        _ => Number::from(0),
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recife() -> Location {
        Location::default()
    }

    #[test]
    fn normalizes_full_current_block() {
        let current = json!({
            "temperature_2m": [27.5],
            "apparent_temperature": [28.2],
            "relative_humidity_2m": [70],
            "wind_speed_10m": [12.3],
            "weather_code": [3],
            "precipitation_probability": [40],
        });

        let event = normalize(&current, &recife(), &ConditionTable::default());

        assert_eq!(event.location, "Recife, Brasil");
        assert_eq!(event.latitude, -8.05);
        assert_eq!(event.longitude, -34.9);
        assert_eq!(event.temperature, 27.5);
        assert_eq!(event.feels_like, 28.2);
        assert_eq!(event.humidity, Number::from(70));
        assert_eq!(event.wind_speed, 12.3);
        assert_eq!(event.condition, "cloudy");
        assert_eq!(event.rain_probability, 0.4);
        assert_eq!(event.raw, current);
    }

    #[test]
    fn scalar_and_single_element_array_are_equivalent() {
        let as_arrays = json!({
            "temperature_2m": [21.0],
            "apparent_temperature": [20.4],
            "relative_humidity_2m": [55],
            "wind_speed_10m": [8.1],
            "weather_code": [61],
            "precipitation_probability": [80],
        });
        let as_scalars = json!({
            "temperature_2m": 21.0,
            "apparent_temperature": 20.4,
            "relative_humidity_2m": 55,
            "wind_speed_10m": 8.1,
            "weather_code": 61,
            "precipitation_probability": 80,
        });

        let location = recife();
        let table = ConditionTable::default();
        let a = normalize(&as_arrays, &location, &table);
        let b = normalize(&as_scalars, &location, &table);

        assert_eq!(a.temperature, b.temperature);
        assert_eq!(a.feels_like, b.feels_like);
        assert_eq!(a.humidity, b.humidity);
        assert_eq!(a.wind_speed, b.wind_speed);
        assert_eq!(a.condition, b.condition);
        assert_eq!(a.rain_probability, b.rain_probability);
    }

    #[test]
    fn missing_apparent_temperature_falls_back_to_temperature() {
        let current = json!({
            "temperature_2m": [19.96],
            "relative_humidity_2m": [60],
        });

        let event = normalize(&current, &recife(), &ConditionTable::default());

        assert_eq!(event.temperature, 20.0);
        // Fallback happens before rounding, so both match post-rounding.
        assert_eq!(event.feels_like, event.temperature);
    }

    #[test]
    fn percentage_probability_is_scaled_into_unit_interval() {
        let table = ConditionTable::default();
        let location = recife();

        let pct = normalize(&json!({ "precipitation_probability": [40] }), &location, &table);
        assert_eq!(pct.rain_probability, 0.4);

        let fraction =
            normalize(&json!({ "precipitation_probability": 0.37 }), &location, &table);
        assert_eq!(fraction.rain_probability, 0.37);

        let full = normalize(&json!({ "precipitation_probability": [100] }), &location, &table);
        assert_eq!(full.rain_probability, 1.0);

        let exact_one = normalize(&json!({ "precipitation_probability": 1 }), &location, &table);
        assert_eq!(exact_one.rain_probability, 1.0);
    }

    #[test]
    fn probability_is_rounded_to_two_decimals() {
        let event = normalize(
            &json!({ "precipitation_probability": [33.333] }),
            &recife(),
            &ConditionTable::default(),
        );

        assert_eq!(event.rain_probability, 0.33);
    }

    #[test]
    fn weather_codes_map_through_the_table() {
        let table = ConditionTable::default();
        let location = recife();

        let storm = normalize(&json!({ "weather_code": [99] }), &location, &table);
        assert_eq!(storm.condition, "thunderstorm");

        let partly = normalize(&json!({ "weather_code": 2 }), &location, &table);
        assert_eq!(partly.condition, "partly_cloudy");

        let unknown = normalize(&json!({ "weather_code": [500] }), &location, &table);
        assert_eq!(unknown.condition, "unknown");
    }

    #[test]
    fn empty_current_block_yields_defaults() {
        let event = normalize(&json!({}), &recife(), &ConditionTable::default());

        assert_eq!(event.temperature, 0.0);
        assert_eq!(event.feels_like, 0.0);
        assert_eq!(event.humidity, Number::from(0));
        assert_eq!(event.wind_speed, 0.0);
        assert_eq!(event.condition, "clear");
        assert_eq!(event.rain_probability, 0.0);
        assert_eq!(event.raw, json!({}));
    }

    #[test]
    fn timestamp_is_second_precision_utc_with_z() {
        let event = normalize(&json!({}), &recife(), &ConditionTable::default());

        assert!(event.timestamp.ends_with('Z'));
        // "2026-08-28T12:00:00Z" is 20 characters.
        assert_eq!(event.timestamp.len(), 20);
    }

    #[test]
    fn humidity_preserves_float_representation() {
        let event = normalize(
            &json!({ "relative_humidity_2m": [70.5] }),
            &recife(),
            &ConditionTable::default(),
        );

        assert_eq!(event.humidity.as_f64(), Some(70.5));
    }
}
