use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy for the aggregation core.
///
/// Propagation policy: validation failures (`MalformedTimestamp`,
/// `InvalidReading`) are terminal for the record but never abort sibling
/// records; write conflicts (`AlreadyExists`/`Conflict`/`Vanished` store
/// outcomes) are retried in-process with bounded backoff and surface here
/// only as `RetriesExhausted`; `StorageUnavailable` is not retried locally
/// and bubbles to the batch result so the stream redelivers.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Malformed timestamp: {0}")]
    MalformedTimestamp(String),

    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    #[error("Gave up after {attempts} conflicting write attempts for {sensor_id}/{hour_bucket}")]
    RetriesExhausted {
        sensor_id: String,
        hour_bucket: String,
        attempts: u32,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AggregationError {
    /// Whether the batch caller must surface this error for redelivery.
    /// Validation failures and retried conflicts are soft; storage outages
    /// and retry exhaustion are hard.
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            AggregationError::StorageUnavailable(_) | AggregationError::RetriesExhausted { .. }
        )
    }
}

impl From<serde_dynamo::Error> for AggregationError {
    fn from(err: serde_dynamo::Error) -> Self {
        AggregationError::Serialization(err.to_string())
    }
}

/// Standard error response payload for the HTTP front door.
/// Contains a stable machine-readable error code, a human-readable message,
/// and the request ID for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub request_id: String,
}

impl ErrorResponse {
    pub fn new(
        error: impl Into<String>,
        message: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            request_id: request_id.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Stable error codes used by the front door
pub mod error_codes {
    pub const MISSING_FIELD: &str = "MISSING_FIELD";
    pub const INVALID_VALUE: &str = "INVALID_VALUE";
    pub const INVALID_TIMESTAMP: &str = "INVALID_TIMESTAMP";
    pub const INVALID_FORMAT: &str = "INVALID_FORMAT";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_and_soft_errors() {
        assert!(AggregationError::StorageUnavailable("timeout".into()).is_hard());
        assert!(AggregationError::RetriesExhausted {
            sensor_id: "s".into(),
            hour_bucket: "h".into(),
            attempts: 5
        }
        .is_hard());

        assert!(!AggregationError::InvalidReading("missing value".into()).is_hard());
        assert!(!AggregationError::MalformedTimestamp("nope".into()).is_hard());
    }

    #[test]
    fn test_error_response_round_trip() {
        let error = ErrorResponse::new("INVALID_TIMESTAMP", "not ISO-8601", "req-123");
        let json = error.to_json().unwrap();

        let parsed: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.error, "INVALID_TIMESTAMP");
        assert_eq!(parsed.message, "not ISO-8601");
        assert_eq!(parsed.request_id, "req-123");
    }
}
