use futures::stream::{self, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::bucket::hour_bucket;
use crate::domain::{ChangeRecord, Reading};
use crate::error::AggregationError;
use crate::fold::fold;
use crate::normalize::{normalize, NormalizedRecord};
use crate::store::{AggregateStore, CreateOutcome, UpdateOutcome};
use crate::time::Clock;

/// Bounded retry policy for conditional-write conflicts.
///
/// Exponential backoff with jitter; exhaustion surfaces as
/// `RetriesExhausted` instead of recursing forever.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (1-based), with up to 50% jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = (self.base_delay.as_millis() as u64)
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay.as_millis() as u64);
        let jitter = rand::thread_rng().gen_range(0..=capped / 2);
        Duration::from_millis(capped + jitter)
    }
}

/// Per-record outcome reported by the batch processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Applied,
    Skipped,
    Invalid,
    Failed,
}

/// Tally of one delivered batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub applied: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Applied => self.applied += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Invalid => self.invalid += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }

    /// Whether the batch must be surfaced to the delivery mechanism for
    /// redelivery. Soft/validation failures never count.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Drives one delivered change-stream batch to completion.
///
/// Records run concurrently with no mutual ordering guarantee, bounded by
/// `max_concurrency`. Each valid reading goes through read, fold, and
/// conditional write; the versioned guard turns an interleaving writer into
/// a `Conflict`, which retries the whole cycle from the read step.
pub struct BatchProcessor<S: AggregateStore> {
    store: S,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    max_concurrency: usize,
}

impl<S: AggregateStore> BatchProcessor<S> {
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        max_concurrency: usize,
    ) -> Self {
        // Every reading gets at least one write attempt
        let retry = RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            ..retry
        };
        Self {
            store,
            clock,
            retry,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process all records of one delivered batch.
    ///
    /// The failure of one record never cancels or blocks its siblings; the
    /// summary carries the per-record outcomes for the caller to act on.
    pub async fn process_batch(&self, records: Vec<ChangeRecord>) -> BatchSummary {
        let outcomes = stream::iter(records)
            .map(|record| self.process_record(record))
            .buffer_unordered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary
    }

    async fn process_record(&self, record: ChangeRecord) -> RecordOutcome {
        let reading = match normalize(&record.event_name, &record.new_image) {
            NormalizedRecord::Skip => return RecordOutcome::Skipped,
            NormalizedRecord::Invalid(err) => {
                warn!(error = %err, "Dropping invalid change record");
                return RecordOutcome::Invalid;
            }
            NormalizedRecord::Reading(reading) => reading,
        };

        match self.apply_reading(&reading).await {
            Ok(()) => RecordOutcome::Applied,
            Err(AggregationError::MalformedTimestamp(ts)) => {
                warn!(
                    sensor_id = %reading.sensor_id,
                    timestamp = %ts,
                    "Dropping reading with malformed timestamp"
                );
                RecordOutcome::Invalid
            }
            Err(e) => {
                error!(
                    sensor_id = %reading.sensor_id,
                    error = %e,
                    "Failed to fold reading into aggregate"
                );
                RecordOutcome::Failed
            }
        }
    }

    /// Fold one reading into its hour-bucket aggregate.
    ///
    /// Conflicts (`AlreadyExists`, `Conflict`, `Vanished`) retry the whole
    /// read-fold-write cycle with backoff; storage failures propagate
    /// immediately so the delivery mechanism can redeliver the batch.
    pub async fn apply_reading(&self, reading: &Reading) -> Result<(), AggregationError> {
        let bucket = hour_bucket(&reading.timestamp)?;

        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry.backoff(attempt - 1)).await;
            }

            let existing = self.store.get(&reading.sensor_id, &bucket).await?;
            let now = self.clock.now_iso8601();
            let next = fold(existing.as_ref(), reading, &bucket, &now);

            match existing {
                None => match self.store.create(&next).await? {
                    CreateOutcome::Created => return Ok(()),
                    CreateOutcome::AlreadyExists => {
                        warn!(
                            sensor_id = %reading.sensor_id,
                            hour_bucket = %bucket,
                            attempt,
                            "Concurrent writer created the aggregate first, retrying"
                        );
                    }
                },
                Some(current) => {
                    match self.store.update(&next, Some(current.version)).await? {
                        UpdateOutcome::Updated => return Ok(()),
                        UpdateOutcome::Conflict | UpdateOutcome::Vanished => {
                            warn!(
                                sensor_id = %reading.sensor_id,
                                hour_bucket = %bucket,
                                attempt,
                                "Conditional write lost to a concurrent fold, retrying"
                            );
                        }
                    }
                }
            }
        }

        Err(AggregationError::RetriesExhausted {
            sensor_id: reading.sensor_id.clone(),
            hour_bucket: bucket,
            attempts: self.retry.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        };

        // Jitter adds at most 50%, so bounds are deterministic
        let first = policy.backoff(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));

        let third = policy.backoff(3);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(600));

        let tenth = policy.backoff(10);
        assert!(tenth <= Duration::from_millis(600));
    }

    #[test]
    fn test_summary_tallies_outcomes() {
        let mut summary = BatchSummary::default();
        summary.record(RecordOutcome::Applied);
        summary.record(RecordOutcome::Applied);
        summary.record(RecordOutcome::Skipped);
        summary.record(RecordOutcome::Invalid);

        assert_eq!(summary.applied, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.invalid, 1);
        assert!(!summary.has_failures());

        summary.record(RecordOutcome::Failed);
        assert!(summary.has_failures());
    }
}
