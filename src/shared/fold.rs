use crate::domain::{Aggregate, Reading};

/// Fold one reading into the aggregate for its hour bucket.
///
/// With no existing aggregate the result is the initial state
/// (`count = 1`, `avg = min = max = value`, unrounded). Otherwise `sum` and
/// `count` accumulate, `avg` becomes `round2(sum / count)`, `min`/`max`
/// only move outward, and `sensor_type`/`location` are last-writer-wins
/// from the incoming reading.
///
/// The rounding never feeds back into `sum`, so repeated folds accumulate
/// exactly. The caller's store bumps `version` on write; the fold carries
/// it through unchanged.
pub fn fold(
    existing: Option<&Aggregate>,
    reading: &Reading,
    hour_bucket: &str,
    now: &str,
) -> Aggregate {
    match existing {
        None => Aggregate {
            sensor_id: reading.sensor_id.clone(),
            hour_bucket: hour_bucket.to_string(),
            sum: reading.value,
            avg: reading.value,
            min: reading.value,
            max: reading.value,
            count: 1,
            last_updated: now.to_string(),
            sensor_type: reading.sensor_type.clone(),
            location: reading.location.clone(),
            version: 1,
        },
        Some(current) => {
            let sum = current.sum + reading.value;
            let count = current.count + 1;
            Aggregate {
                sensor_id: current.sensor_id.clone(),
                hour_bucket: current.hour_bucket.clone(),
                sum,
                avg: round2(sum / count as f64),
                min: current.min.min(reading.value),
                max: current.max.max(reading.value),
                count,
                last_updated: now.to_string(),
                sensor_type: reading.sensor_type.clone(),
                location: reading.location.clone(),
                version: current.version,
            }
        }
    }
}

/// Round to 2 decimal places for the stored `avg` attribute
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(value: f64) -> Reading {
        Reading {
            sensor_id: "sensor-1".to_string(),
            timestamp: "2025-07-13T14:37:12.500Z".to_string(),
            sensor_type: "temperature".to_string(),
            value,
            location: "greenhouse-a".to_string(),
            environment: "prod".to_string(),
        }
    }

    const BUCKET: &str = "2025-07-13T14:00:00";
    const NOW: &str = "2025-07-13T14:37:13Z";

    #[test]
    fn test_first_reading_initializes_aggregate() {
        let aggregate = fold(None, &reading(20.0), BUCKET, NOW);

        assert_eq!(aggregate.count, 1);
        assert_eq!(aggregate.avg, 20.0);
        assert_eq!(aggregate.min, 20.0);
        assert_eq!(aggregate.max, 20.0);
        assert_eq!(aggregate.sum, 20.0);
        assert_eq!(aggregate.hour_bucket, BUCKET);
        assert_eq!(aggregate.last_updated, NOW);
        assert_eq!(aggregate.version, 1);
    }

    #[test]
    fn test_first_reading_avg_is_not_rounded() {
        let aggregate = fold(None, &reading(21.333), BUCKET, NOW);
        assert_eq!(aggregate.avg, 21.333);
    }

    #[test]
    fn test_worked_example_three_readings() {
        let first = fold(None, &reading(20.0), BUCKET, NOW);
        let second = fold(Some(&first), &reading(24.0), BUCKET, NOW);
        let third = fold(Some(&second), &reading(22.0), BUCKET, NOW);

        assert_eq!(third.avg, 22.0);
        assert_eq!(third.min, 20.0);
        assert_eq!(third.max, 24.0);
        assert_eq!(third.count, 3);
    }

    #[test]
    fn test_min_max_only_move_outward() {
        let first = fold(None, &reading(20.0), BUCKET, NOW);
        let second = fold(Some(&first), &reading(21.0), BUCKET, NOW);

        // An interior value changes neither extreme
        assert_eq!(second.min, 20.0);
        assert_eq!(second.max, 21.0);

        let third = fold(Some(&second), &reading(20.5), BUCKET, NOW);
        assert_eq!(third.min, 20.0);
        assert_eq!(third.max, 21.0);
    }

    #[test]
    fn test_avg_rounded_to_two_decimals() {
        let first = fold(None, &reading(1.0), BUCKET, NOW);
        let second = fold(Some(&first), &reading(2.0), BUCKET, NOW);
        let third = fold(Some(&second), &reading(2.0), BUCKET, NOW);

        // 5 / 3 = 1.666... -> 1.67
        assert_eq!(third.avg, 1.67);
        // Accumulation stays exact
        assert_eq!(third.sum, 5.0);
    }

    #[test]
    fn test_rounding_does_not_feed_back_into_sum() {
        let mut aggregate = fold(None, &reading(0.1), BUCKET, NOW);
        for _ in 0..999 {
            aggregate = fold(Some(&aggregate), &reading(0.1), BUCKET, NOW);
        }

        assert_eq!(aggregate.count, 1000);
        assert!((aggregate.sum - 100.0).abs() < 1e-9);
        assert_eq!(aggregate.avg, 0.1);
    }

    #[test]
    fn test_sensor_type_and_location_are_last_writer_wins() {
        let first = fold(None, &reading(20.0), BUCKET, NOW);

        let mut moved = reading(24.0);
        moved.sensor_type = "humidity".to_string();
        moved.location = "greenhouse-b".to_string();
        let second = fold(Some(&first), &moved, BUCKET, NOW);

        assert_eq!(second.sensor_type, "humidity");
        assert_eq!(second.location, "greenhouse-b");
    }

    #[test]
    fn test_negative_values() {
        let first = fold(None, &reading(-5.0), BUCKET, NOW);
        let second = fold(Some(&first), &reading(3.0), BUCKET, NOW);

        assert_eq!(second.min, -5.0);
        assert_eq!(second.max, 3.0);
        assert_eq!(second.avg, -1.0);
    }

    #[test]
    fn test_invariant_min_avg_max() {
        let values = [3.7, -1.2, 0.0, 19.45, 6.66];
        let mut aggregate: Option<Aggregate> = None;
        for value in values {
            aggregate = Some(fold(aggregate.as_ref(), &reading(value), BUCKET, NOW));
        }

        let aggregate = aggregate.unwrap();
        assert!(aggregate.min <= aggregate.avg + 0.005);
        assert!(aggregate.avg <= aggregate.max + 0.005);
    }
}
