use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::time::Duration;

use sensor_rollup::RetryPolicy;

/// Configuration for the aggregation stream processor
#[derive(Debug, Clone)]
pub struct Config {
    /// DynamoDB client
    pub dynamodb_client: DynamoDbClient,
    /// Hourly aggregates table name
    pub aggregates_table: String,
    /// Bounded retry attempts for conditional-write conflicts
    pub max_retry_attempts: u32,
    /// Concurrent in-flight records per delivered batch
    pub max_concurrency: usize,
}

impl Config {
    /// Create a new Config instance from environment variables
    pub async fn from_env() -> Result<Self, ConfigError> {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;

        // Leave headroom under the Lambda timeout
        let dynamodb_config = aws_sdk_dynamodb::config::Builder::from(&aws_config)
            .timeout_config(
                aws_sdk_dynamodb::config::timeout::TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(25))
                    .operation_attempt_timeout(Duration::from_secs(10))
                    .build(),
            )
            .build();

        let dynamodb_client = DynamoDbClient::from_conf(dynamodb_config);

        let aggregates_table = std::env::var("AGGREGATES_TABLE")
            .map_err(|_| ConfigError::MissingEnvVar("AGGREGATES_TABLE".to_string()))?;

        let max_retry_attempts = optional_parsed("MAX_RETRY_ATTEMPTS", 5)?;
        let max_concurrency = optional_parsed("MAX_CONCURRENCY", 8)?;

        Ok(Config {
            dynamodb_client,
            aggregates_table,
            max_retry_attempts,
            max_concurrency,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retry_attempts,
            ..RetryPolicy::default()
        }
    }
}

fn optional_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidEnvVar(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Environment variable {0} has unparseable value: {1}")]
    InvalidEnvVar(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_parsed_defaults_when_unset() {
        std::env::remove_var("TEST_AGG_UNSET");
        let value: u32 = optional_parsed("TEST_AGG_UNSET", 5).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn test_optional_parsed_reads_env() {
        std::env::set_var("TEST_AGG_SET", "12");
        let value: usize = optional_parsed("TEST_AGG_SET", 8).unwrap();
        assert_eq!(value, 12);
        std::env::remove_var("TEST_AGG_SET");
    }

    #[test]
    fn test_optional_parsed_rejects_garbage() {
        std::env::set_var("TEST_AGG_BAD", "not-a-number");
        let result: Result<u32, _> = optional_parsed("TEST_AGG_BAD", 5);
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
        std::env::remove_var("TEST_AGG_BAD");
    }

    #[tokio::test]
    async fn test_config_from_env_requires_table() {
        std::env::remove_var("AGGREGATES_TABLE");
        let result = Config::from_env().await;
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(var)) if var == "AGGREGATES_TABLE"));
    }
}
