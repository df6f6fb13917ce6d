use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::Reading;
use crate::error::AggregationError;

/// Outcome of normalizing one raw change-stream record
#[derive(Debug)]
pub enum NormalizedRecord {
    /// Event kind is intentionally ignored (REMOVE and anything unknown)
    Skip,
    /// Record failed shape validation; dropped without affecting the batch
    Invalid(AggregationError),
    /// A well-formed reading ready to fold
    Reading(Reading),
}

fn invalid(reason: impl Into<String>) -> NormalizedRecord {
    NormalizedRecord::Invalid(AggregationError::InvalidReading(reason.into()))
}

/// Loosely-typed image used to validate shape before committing to `Reading`
#[derive(Debug, Deserialize)]
struct RawReading {
    sensor_id: Option<String>,
    timestamp: Option<String>,
    #[serde(rename = "type")]
    sensor_type: Option<String>,
    value: Option<f64>,
    location: Option<String>,
    environment: Option<String>,
}

/// Validate and decode one change-stream record.
///
/// Only INSERT and MODIFY kinds are processed; everything else is `Skip`.
/// A record is a valid reading iff the new image is present and carries a
/// non-empty `sensor_id`, a non-empty `timestamp`, and a numeric `value`.
/// Violations yield `Invalid` so a single bad record never aborts the batch.
pub fn normalize(event_name: &str, new_image: &serde_dynamo::Item) -> NormalizedRecord {
    if event_name != "INSERT" && event_name != "MODIFY" {
        return NormalizedRecord::Skip;
    }

    let image: HashMap<String, serde_dynamo::AttributeValue> = new_image.clone().into();
    if image.is_empty() {
        return invalid("missing new image");
    }

    let raw: RawReading = match serde_dynamo::from_item(serde_dynamo::Item::from(image)) {
        Ok(raw) => raw,
        Err(e) => return invalid(format!("undecodable image: {}", e)),
    };

    let sensor_id = match raw.sensor_id {
        Some(id) if !id.is_empty() => id,
        _ => return invalid("missing or empty sensor_id"),
    };
    let timestamp = match raw.timestamp {
        Some(ts) if !ts.is_empty() => ts,
        _ => return invalid("missing or empty timestamp"),
    };
    let value = match raw.value {
        Some(value) if value.is_finite() => value,
        _ => return invalid("missing or non-numeric value"),
    };

    NormalizedRecord::Reading(Reading {
        sensor_id,
        timestamp,
        sensor_type: raw.sensor_type.unwrap_or_default(),
        value,
        location: raw.location.unwrap_or_default(),
        environment: raw.environment.unwrap_or_default(),
    })
}
