use serde::{Deserialize, Serialize};

/// A single timestamped sensor observation, as written to the readings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: String,
    /// ISO-8601 timestamp of the observation (not the ingest time)
    pub timestamp: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub value: f64,
    pub location: String,
    #[serde(default)]
    pub environment: String,
}

/// Running statistics for one sensor within one hour bucket.
///
/// Identity is `(sensor_id, hour_bucket)`. `sum` is the accumulation of
/// record; `avg` is recomputed from `sum / count` and rounded to 2 decimals
/// at every write, so consumers see the rounded shape without the rounding
/// ever feeding back into accumulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub sensor_id: String,
    pub hour_bucket: String,
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: i64,
    pub last_updated: String,
    pub sensor_type: String,
    pub location: String,
    /// Optimistic-concurrency token, bumped by every successful write
    #[serde(default = "initial_version")]
    pub version: i64,
}

fn initial_version() -> i64 {
    1
}

impl Aggregate {
    /// Key pair identifying this aggregate in the store
    pub fn key(&self) -> (&str, &str) {
        (&self.sensor_id, &self.hour_bucket)
    }
}

/// One change-stream record as the batch processor consumes it:
/// the delivery kind plus the post-change image (empty for REMOVE).
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub event_name: String,
    pub new_image: serde_dynamo::Item,
}
