//! Call value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Call lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    /// Controller created, nothing connected yet
    Idle,
    /// Call is incoming
    Ringing,
    /// Call is in progress
    Active,
    /// Cleanup chain is running
    Terminating,
    /// Call has ended
    Ended,
    /// Call ended through an unrecoverable failure
    Error,
}

impl CallState {
    /// Check if state transition is valid
    pub fn can_transition_to(&self, new_state: CallState) -> bool {
        use CallState::*;

        match (self, new_state) {
            // Terminal states have no outgoing transitions
            (Ended, _) | (Error, _) => false,

            // Unrecoverable failure is reachable from every live state
            (_, Error) => true,

            (Idle, Ringing) => true,
            (Ringing, Active) => true,
            (Active, Terminating) => true,
            (Terminating, Ended) => true,

            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Ended | CallState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Idle => "IDLE",
            CallState::Ringing => "RINGING",
            CallState::Active => "ACTIVE",
            CallState::Terminating => "TERMINATING",
            CallState::Ended => "ENDED",
            CallState::Error => "ERROR",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a termination was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Caller said a termination phrase
    PhraseDetected,
    /// Upstream asked the controller to end the call
    Requested,
    /// The far end left the room before we tore it down
    RemoteHangup,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::PhraseDetected => "phrase_detected",
            TerminationReason::Requested => "requested",
            TerminationReason::RemoteHangup => "remote_hangup",
        }
    }
}

/// Final disposition of a termination, reported in `CALL_TERMINATED`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Every tier action succeeded
    Success,
    /// Call ended, but at least one step reported a problem
    SuccessWithWarnings,
    /// Call was forced into ERROR
    Failure,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Success => "success",
            Disposition::SuccessWithWarnings => "success_with_warnings",
            Disposition::Failure => "failure",
        }
    }
}

/// Coarse duration bucket for analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallClassification {
    Short,
    Medium,
    Long,
    Unknown,
}

impl CallClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallClassification::Short => "short",
            CallClassification::Medium => "medium",
            CallClassification::Long => "long",
            CallClassification::Unknown => "unknown",
        }
    }
}
