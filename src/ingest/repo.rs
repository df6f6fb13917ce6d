use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;

use sensor_rollup::{AggregationError, Reading};

/// Write a reading to the readings table if one does not already exist for
/// `(sensor_id, timestamp)`, so duplicate deliveries stay idempotent.
///
/// Returns `Ok(true)` when the reading was written and `Ok(false)` when an
/// identical identity was already present.
pub async fn put_reading_if_new(
    client: &DynamoDbClient,
    table: &str,
    reading: &Reading,
) -> Result<bool, AggregationError> {
    let mut item = HashMap::new();
    item.insert(
        "sensor_id".to_string(),
        AttributeValue::S(reading.sensor_id.clone()),
    );
    item.insert(
        "timestamp".to_string(),
        AttributeValue::S(reading.timestamp.clone()),
    );
    item.insert(
        "type".to_string(),
        AttributeValue::S(reading.sensor_type.clone()),
    );
    item.insert(
        "value".to_string(),
        AttributeValue::N(reading.value.to_string()),
    );
    item.insert(
        "location".to_string(),
        AttributeValue::S(reading.location.clone()),
    );
    item.insert(
        "environment".to_string(),
        AttributeValue::S(reading.environment.clone()),
    );

    // "timestamp" is a DynamoDB reserved word
    let result = client
        .put_item()
        .table_name(table)
        .set_item(Some(item))
        .condition_expression("attribute_not_exists(sensor_id) AND attribute_not_exists(#ts)")
        .expression_attribute_names("#ts", "timestamp")
        .send()
        .await;

    match result {
        Ok(_) => Ok(true),
        Err(err) if is_condition_failure(&err) => Ok(false),
        Err(err) => Err(AggregationError::StorageUnavailable(format!(
            "put_item: {:?}",
            err
        ))),
    }
}

fn is_condition_failure(err: &SdkError<PutItemError>) -> bool {
    match err {
        SdkError::ServiceError(service_err) => matches!(
            service_err.err(),
            PutItemError::ConditionalCheckFailedException(_)
        ),
        _ => false,
    }
}
