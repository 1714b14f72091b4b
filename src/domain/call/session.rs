//! Call session timer

use crate::domain::call::value_object::CallClassification;
use crate::domain::shared::events::iso_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SHORT_CALL_SECONDS: f64 = 30.0;
const LONG_CALL_SECONDS: f64 = 300.0;

/// Start/end instants of one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSession {
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

/// Duration figures exported with `CALL_TERMINATED`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationSummary {
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_seconds: f64,
    pub duration_minutes: f64,
    pub duration_formatted: String,
    pub classification: CallClassification,
}

impl CallSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start instant. A session that already started keeps its original instant.
    pub fn start(&mut self) -> bool {
        self.start_at(Utc::now())
    }

    pub fn start_at(&mut self, at: DateTime<Utc>) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(at);
        true
    }

    /// Record the end instant. Ignored before `start` and after the first `stop`.
    pub fn stop(&mut self) -> bool {
        self.stop_at(Utc::now())
    }

    pub fn stop_at(&mut self, at: DateTime<Utc>) -> bool {
        if self.started_at.is_none() || self.ended_at.is_some() {
            return false;
        }
        self.ended_at = Some(at);
        true
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.ended_at = None;
    }

    pub fn is_active(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_none()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn is_complete(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_some()
    }

    /// Seconds between start and stop; `0.0` unless both are set, never negative.
    pub fn duration(&self) -> f64 {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => {
                let millis = (end - start).num_milliseconds();
                (millis.max(0) as f64) / 1000.0
            }
            _ => 0.0,
        }
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration() / 60.0
    }

    /// e.g. `"45 seconds"`, `"2 minutes 5 seconds"`
    pub fn formatted_duration(&self) -> String {
        let total = self.duration().floor() as u64;
        let minutes = total / 60;
        let seconds = total % 60;

        if minutes > 0 {
            format!("{} minutes {} seconds", minutes, seconds)
        } else {
            format!("{} seconds", seconds)
        }
    }

    pub fn classification(&self) -> CallClassification {
        if !self.is_complete() {
            return CallClassification::Unknown;
        }
        match self.duration() {
            d if d < SHORT_CALL_SECONDS => CallClassification::Short,
            d if d < LONG_CALL_SECONDS => CallClassification::Medium,
            _ => CallClassification::Long,
        }
    }

    pub fn summary(&self) -> DurationSummary {
        DurationSummary {
            started_at: self.started_at.map(iso_timestamp),
            ended_at: self.ended_at.map(iso_timestamp),
            duration_seconds: self.duration(),
            duration_minutes: self.duration_minutes(),
            duration_formatted: self.formatted_duration(),
            classification: self.classification(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 11, 14, 30, 0).unwrap()
    }

    fn session_lasting(seconds: i64) -> CallSession {
        let mut session = CallSession::new();
        session.start_at(t0());
        session.stop_at(t0() + Duration::seconds(seconds));
        session
    }

    #[test]
    fn test_duration_and_formatting() {
        let session = session_lasting(125);
        assert_eq!(session.duration(), 125.0);
        assert_eq!(session.formatted_duration(), "2 minutes 5 seconds");

        assert_eq!(session_lasting(65).formatted_duration(), "1 minutes 5 seconds");
        assert_eq!(session_lasting(45).formatted_duration(), "45 seconds");
        assert_eq!(session_lasting(0).formatted_duration(), "0 seconds");
    }

    #[test]
    fn test_duration_zero_without_both_timestamps() {
        let mut session = CallSession::new();
        assert_eq!(session.duration(), 0.0);
        assert_eq!(session.formatted_duration(), "0 seconds");

        session.start_at(t0());
        assert_eq!(session.duration(), 0.0);
        assert!(session.is_active());
    }

    #[test]
    fn test_stop_without_start_is_ignored() {
        let mut session = CallSession::new();
        assert!(!session.stop_at(t0()));
        assert_eq!(session.ended_at(), None);
        assert!(!session.is_active());
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let mut session = CallSession::new();
        assert!(session.start_at(t0()));
        assert!(!session.start_at(t0() + Duration::seconds(10)));
        assert!(session.stop_at(t0() + Duration::seconds(30)));
        assert!(!session.stop_at(t0() + Duration::seconds(90)));

        assert_eq!(session.started_at(), Some(t0()));
        assert_eq!(session.duration(), 30.0);
        assert!(!session.is_active());
    }

    #[test]
    fn test_duration_never_negative() {
        let mut session = CallSession::new();
        session.start_at(t0());
        session.stop_at(t0() - Duration::seconds(5));
        assert_eq!(session.duration(), 0.0);
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut session = session_lasting(40);
        session.reset();

        assert_eq!(session.started_at(), None);
        assert_eq!(session.ended_at(), None);
        assert_eq!(session.duration(), 0.0);

        session.start_at(t0());
        session.stop_at(t0() + Duration::seconds(3));
        assert_eq!(session.duration(), 3.0);
    }

    #[test]
    fn test_fractional_seconds_kept() {
        let mut session = CallSession::new();
        session.start_at(t0());
        session.stop_at(t0() + Duration::milliseconds(2_500));
        assert_eq!(session.duration(), 2.5);
        assert_eq!(session.formatted_duration(), "2 seconds");
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(CallSession::new().classification(), CallClassification::Unknown);
        assert_eq!(session_lasting(29).classification(), CallClassification::Short);
        assert_eq!(session_lasting(30).classification(), CallClassification::Medium);
        assert_eq!(session_lasting(299).classification(), CallClassification::Medium);
        assert_eq!(session_lasting(300).classification(), CallClassification::Long);
    }

    #[test]
    fn test_summary_export() {
        let summary = session_lasting(90).summary();
        assert_eq!(summary.duration_seconds, 90.0);
        assert_eq!(summary.duration_minutes, 1.5);
        assert_eq!(summary.duration_formatted, "1 minutes 30 seconds");
        assert_eq!(summary.classification, CallClassification::Medium);
        assert_eq!(summary.started_at.as_deref(), Some("2025-06-11T14:30:00.000000Z"));
    }
}
