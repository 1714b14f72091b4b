//! Call lifecycle events handed to the logging sink

use crate::domain::call::value_object::CallState;
use crate::domain::shared::events::{iso_timestamp, DomainEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    CallStateChanged,
    PhraseDetected,
    TerminationInitiated,
    TerminationStep,
    CallTerminated,
    CallError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CallStateChanged => "CALL_STATE_CHANGED",
            EventKind::PhraseDetected => "PHRASE_DETECTED",
            EventKind::TerminationInitiated => "TERMINATION_INITIATED",
            EventKind::TerminationStep => "TERMINATION_STEP",
            EventKind::CallTerminated => "CALL_TERMINATED",
            EventKind::CallError => "CALL_ERROR",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured log record:
/// `{ "event": .., "timestamp": .., "state": .., "metadata": {..} }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationEvent {
    pub event: EventKind,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    pub state: CallState,
    pub metadata: Value,
}

impl TerminationEvent {
    pub fn new(event: EventKind, state: CallState, metadata: Value) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            state,
            metadata,
        }
    }

    /// Metadata field lookup, `None` when absent or metadata is not an object
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.metadata.as_object()?.get(key)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"event\":\"{}\",\"state\":\"{}\",\"serialization_error\":\"{}\"}}",
                self.event, self.state, e
            )
        })
    }
}

impl DomainEvent for TerminationEvent {
    fn event_type(&self) -> &'static str {
        self.event.as_str()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

mod iso8601 {
    use super::iso_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&iso_timestamp(*at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
