//! Test utilities for property-based testing
//!
//! Proptest generators for domain inputs: sensor values, timestamps, and
//! complete readings. Used by the unit tests here and the integration suites
//! under `tests/`.

pub mod generators {
    use proptest::prelude::*;

    use crate::domain::Reading;

    /// Sensor values in a realistic, finite range
    pub fn sensor_value() -> impl Strategy<Value = f64> {
        -1_000_000.0..1_000_000.0f64
    }

    /// Non-empty batches of sensor values
    pub fn sensor_values() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(sensor_value(), 1..50)
    }

    /// A sensor identifier like "sensor-042"
    pub fn sensor_id() -> impl Strategy<Value = String> {
        (0u32..1000).prop_map(|n| format!("sensor-{:03}", n))
    }

    /// A timestamp inside the hour 2025-07-13T14, varying minute/second/millis
    pub fn timestamp_in_hour() -> impl Strategy<Value = String> {
        (0u32..60, 0u32..60, 0u32..1000).prop_map(|(minute, second, millis)| {
            format!("2025-07-13T14:{:02}:{:02}.{:03}Z", minute, second, millis)
        })
    }

    /// A timestamp anywhere in 2025, always parseable
    pub fn timestamp() -> impl Strategy<Value = String> {
        (1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
            |(month, day, hour, minute, second)| {
                format!(
                    "2025-{:02}-{:02}T{:02}:{:02}:{:02}Z",
                    month, day, hour, minute, second
                )
            },
        )
    }

    /// Strings that must never parse as timestamps
    pub fn malformed_timestamp() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("".to_string()),
            Just("not-a-timestamp".to_string()),
            Just("2025-13-45T99:00:00Z".to_string()),
            Just("1704067200".to_string()),
            Just("July 13, 2025".to_string()),
        ]
    }

    /// A complete well-formed reading in the fixed test hour
    pub fn reading() -> impl Strategy<Value = Reading> {
        (sensor_id(), timestamp_in_hour(), sensor_value()).prop_map(
            |(sensor_id, timestamp, value)| Reading {
                sensor_id,
                timestamp,
                sensor_type: "temperature".to_string(),
                value,
                location: "greenhouse-a".to_string(),
                environment: "test".to_string(),
            },
        )
    }
}

/// Direct (non-incremental) statistics used as the oracle in property tests
pub mod oracle {
    pub fn mean(values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }

    pub fn min(values: &[f64]) -> f64 {
        values.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max(values: &[f64]) -> f64 {
        values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }
}
