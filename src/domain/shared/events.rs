//! Domain events infrastructure

use chrono::{DateTime, Utc};

/// Base trait for all domain events
pub trait DomainEvent: Send + Sync {
    /// Returns the event type name
    fn event_type(&self) -> &'static str;

    /// Returns when the event occurred
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// ISO-8601 timestamp in UTC with microsecond precision, e.g. `2025-06-11T14:30:45.123456Z`
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
