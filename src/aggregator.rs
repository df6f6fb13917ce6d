// Hourly aggregation stream processor entry point

#[path = "aggregator/config.rs"]
mod config;

#[path = "aggregator/repo.rs"]
mod repo;

use aws_lambda_events::event::dynamodb::Event as DynamoDbEvent;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing::{error, info};

use config::Config;
use repo::DynamoAggregateStore;
use sensor_rollup::{BatchProcessor, ChangeRecord, SystemClock};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Configuration is loaded once here and injected; no lazily-fetched
    // process-global state.
    let config = Config::from_env().await.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        Error::from(format!("Configuration error: {}", e))
    })?;

    let store = DynamoAggregateStore::new(
        config.dynamodb_client.clone(),
        config.aggregates_table.clone(),
    );
    let processor = Arc::new(BatchProcessor::new(
        store,
        Arc::new(SystemClock::new()),
        config.retry_policy(),
        config.max_concurrency,
    ));

    run(service_fn(|event: LambdaEvent<DynamoDbEvent>| {
        function_handler(event, Arc::clone(&processor))
    }))
    .await
}

async fn function_handler(
    event: LambdaEvent<DynamoDbEvent>,
    processor: Arc<BatchProcessor<DynamoAggregateStore>>,
) -> Result<(), Error> {
    let records: Vec<ChangeRecord> = event
        .payload
        .records
        .into_iter()
        .map(|record| ChangeRecord {
            event_name: record.event_name,
            new_image: record.change.new_image,
        })
        .collect();

    info!(
        "Processing DynamoDB stream batch with {} records",
        records.len()
    );

    let summary = processor.process_batch(records).await;

    info!(
        "Batch processing complete: {} applied, {} skipped, {} invalid, {} failed",
        summary.applied, summary.skipped, summary.invalid, summary.failed
    );

    // A hard failure surfaces to the runtime so the stream redelivers the
    // whole batch; validation failures never do.
    if summary.has_failures() {
        return Err(Error::from(format!(
            "{} of {} records failed hard; requesting batch redelivery",
            summary.failed,
            summary.applied + summary.skipped + summary.invalid + summary.failed
        )));
    }

    Ok(())
}
