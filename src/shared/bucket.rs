use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::AggregationError;

/// Derive the hour-bucket key for a reading timestamp.
///
/// Accepts RFC 3339 timestamps (offset normalized to UTC) as well as naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` forms. The result is the timestamp truncated
/// to the hour, formatted `YYYY-MM-DDTHH:00:00`.
///
/// Pure and total for any parseable input; anything else is
/// `MalformedTimestamp`.
pub fn hour_bucket(timestamp: &str) -> Result<String, AggregationError> {
    let naive = parse_timestamp(timestamp)?;
    Ok(naive.format("%Y-%m-%dT%H:00:00").to_string())
}

fn parse_timestamp(timestamp: &str) -> Result<NaiveDateTime, AggregationError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(dt.with_timezone(&Utc).naive_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive);
    }
    Err(AggregationError::MalformedTimestamp(timestamp.to_string()))
}
