use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::Aggregate;
use crate::error::AggregationError;

/// Outcome of an atomic create attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// Another writer created the identity first
    AlreadyExists,
}

/// Outcome of a conditional update attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// The concurrency guard failed; re-read and re-fold
    Conflict,
    /// The record was deleted underneath the writer
    Vanished,
}

/// Storage access for aggregate records, keyed `(sensor_id, hour_bucket)`.
///
/// `update` takes an optional expected version. `Some(v)` is the versioned
/// guard the processor uses: the write lands only if the stored record still
/// carries version `v`, which closes the read-modify-write race between
/// concurrent folds of the same identity. `None` guards on existence alone
/// and will silently overwrite an interleaving writer's change; it is kept
/// so the test suite can demonstrate that lost-update baseline.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    async fn get(
        &self,
        sensor_id: &str,
        hour_bucket: &str,
    ) -> Result<Option<Aggregate>, AggregationError>;

    /// Atomic create; fails with `AlreadyExists` if the identity is taken
    async fn create(&self, aggregate: &Aggregate) -> Result<CreateOutcome, AggregationError>;

    /// Conditional write of the full aggregate state. The store bumps the
    /// stored version on every successful write.
    async fn update(
        &self,
        aggregate: &Aggregate,
        expected_version: Option<i64>,
    ) -> Result<UpdateOutcome, AggregationError>;
}

/// In-memory store used by the test suites and local runs.
///
/// Unlike the DynamoDB implementation it can tell a vanished record from a
/// version conflict, which the concurrency tests rely on.
#[derive(Debug, Default)]
pub struct InMemoryAggregateStore {
    records: Mutex<HashMap<(String, String), Aggregate>>,
}

impl InMemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot one aggregate for assertions
    pub async fn snapshot(&self, sensor_id: &str, hour_bucket: &str) -> Option<Aggregate> {
        self.records
            .lock()
            .await
            .get(&(sensor_id.to_string(), hour_bucket.to_string()))
            .cloned()
    }

    /// Remove one aggregate, simulating a concurrent delete
    pub async fn delete(&self, sensor_id: &str, hour_bucket: &str) {
        self.records
            .lock()
            .await
            .remove(&(sensor_id.to_string(), hour_bucket.to_string()));
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl AggregateStore for InMemoryAggregateStore {
    async fn get(
        &self,
        sensor_id: &str,
        hour_bucket: &str,
    ) -> Result<Option<Aggregate>, AggregationError> {
        Ok(self
            .records
            .lock()
            .await
            .get(&(sensor_id.to_string(), hour_bucket.to_string()))
            .cloned())
    }

    async fn create(&self, aggregate: &Aggregate) -> Result<CreateOutcome, AggregationError> {
        let mut records = self.records.lock().await;
        let key = (aggregate.sensor_id.clone(), aggregate.hour_bucket.clone());
        if records.contains_key(&key) {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let mut stored = aggregate.clone();
        stored.version = 1;
        records.insert(key, stored);
        Ok(CreateOutcome::Created)
    }

    async fn update(
        &self,
        aggregate: &Aggregate,
        expected_version: Option<i64>,
    ) -> Result<UpdateOutcome, AggregationError> {
        let mut records = self.records.lock().await;
        let key = (aggregate.sensor_id.clone(), aggregate.hour_bucket.clone());

        let current = match records.get(&key) {
            Some(current) => current,
            None => return Ok(UpdateOutcome::Vanished),
        };

        if let Some(expected) = expected_version {
            if current.version != expected {
                return Ok(UpdateOutcome::Conflict);
            }
        }

        let mut stored = aggregate.clone();
        stored.version = current.version + 1;
        records.insert(key, stored);
        Ok(UpdateOutcome::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(value: f64) -> Aggregate {
        Aggregate {
            sensor_id: "sensor-1".to_string(),
            hour_bucket: "2025-07-13T14:00:00".to_string(),
            sum: value,
            avg: value,
            min: value,
            max: value,
            count: 1,
            last_updated: "2025-07-13T14:37:13Z".to_string(),
            sensor_type: "temperature".to_string(),
            location: "greenhouse-a".to_string(),
            version: 1,
        }
    }

    #[tokio::test]
    async fn test_get_absent_returns_none() {
        let store = InMemoryAggregateStore::new();
        let found = store.get("sensor-1", "2025-07-13T14:00:00").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = InMemoryAggregateStore::new();
        let outcome = store.create(&aggregate(20.0)).await.unwrap();
        assert_eq!(outcome, CreateOutcome::Created);

        let found = store
            .get("sensor-1", "2025-07-13T14:00:00")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.avg, 20.0);
        assert_eq!(found.version, 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_reports_already_exists() {
        let store = InMemoryAggregateStore::new();
        store.create(&aggregate(20.0)).await.unwrap();

        let outcome = store.create(&aggregate(24.0)).await.unwrap();
        assert_eq!(outcome, CreateOutcome::AlreadyExists);

        // First writer's state is untouched
        let found = store
            .get("sensor-1", "2025-07-13T14:00:00")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.avg, 20.0);
    }

    #[tokio::test]
    async fn test_versioned_update_bumps_version() {
        let store = InMemoryAggregateStore::new();
        store.create(&aggregate(20.0)).await.unwrap();

        let mut next = aggregate(22.0);
        next.count = 2;
        let outcome = store.update(&next, Some(1)).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Updated);

        let found = store
            .get("sensor-1", "2025-07-13T14:00:00")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.version, 2);
        assert_eq!(found.count, 2);
    }

    #[tokio::test]
    async fn test_stale_version_reports_conflict() {
        let store = InMemoryAggregateStore::new();
        store.create(&aggregate(20.0)).await.unwrap();
        store.update(&aggregate(21.0), Some(1)).await.unwrap();

        // Still guarding on version 1 after another writer bumped it
        let outcome = store.update(&aggregate(22.0), Some(1)).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Conflict);

        let found = store
            .get("sensor-1", "2025-07-13T14:00:00")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.avg, 21.0);
    }

    #[tokio::test]
    async fn test_update_of_missing_record_reports_vanished() {
        let store = InMemoryAggregateStore::new();
        let outcome = store.update(&aggregate(20.0), Some(1)).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Vanished);
    }

    #[tokio::test]
    async fn test_existence_only_update_overwrites_blindly() {
        let store = InMemoryAggregateStore::new();
        store.create(&aggregate(20.0)).await.unwrap();
        store.update(&aggregate(21.0), Some(1)).await.unwrap();

        // The existence-only guard does not notice the interleaving write
        let outcome = store.update(&aggregate(22.0), None).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Updated);

        let found = store
            .get("sensor-1", "2025-07-13T14:00:00")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.avg, 22.0);
    }
}
