use chrono::{DateTime, SecondsFormat, Utc};

/// Clock abstraction so `last_updated` stamps are injectable in tests
pub trait Clock: Send + Sync {
    /// Current time as an ISO-8601 UTC string, e.g. "2025-07-13T14:37:13Z"
    fn now_iso8601(&self) -> String;
}

/// Production clock backed by system time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_iso8601(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Deterministic clock for tests
#[derive(Debug, Clone)]
pub struct FixedClock {
    timestamp: DateTime<Utc>,
}

impl FixedClock {
    pub fn from_iso8601(timestamp: &str) -> Result<Self, chrono::ParseError> {
        let timestamp = DateTime::parse_from_rfc3339(timestamp)?.with_timezone(&Utc);
        Ok(Self { timestamp })
    }

    /// Advance the fixed time by the given number of seconds
    pub fn advance_seconds(&mut self, seconds: i64) {
        self.timestamp += chrono::Duration::seconds(seconds);
    }
}

impl Clock for FixedClock {
    fn now_iso8601(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_emits_parseable_utc() {
        let now = SystemClock::new().now_iso8601();
        assert!(DateTime::parse_from_rfc3339(&now).is_ok());
        assert!(now.ends_with('Z'));
    }

    #[test]
    fn test_fixed_clock_is_deterministic() {
        let clock = FixedClock::from_iso8601("2025-07-13T14:37:13Z").unwrap();
        assert_eq!(clock.now_iso8601(), "2025-07-13T14:37:13Z");
        assert_eq!(clock.now_iso8601(), clock.now_iso8601());
    }

    #[test]
    fn test_fixed_clock_advance() {
        let mut clock = FixedClock::from_iso8601("2025-07-13T14:37:13Z").unwrap();
        clock.advance_seconds(3600);
        assert_eq!(clock.now_iso8601(), "2025-07-13T15:37:13Z");
    }

    #[test]
    fn test_clock_trait_object() {
        let clock: Box<dyn Clock> = Box::new(FixedClock::from_iso8601("2025-07-13T14:37:13Z").unwrap());
        assert_eq!(clock.now_iso8601(), "2025-07-13T14:37:13Z");
    }
}
