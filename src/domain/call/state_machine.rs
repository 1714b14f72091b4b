//! Call state machine
//!
//! Owns the current [`CallState`] and the accumulated [`CallMetadata`] for
//! one call. Every accepted transition is timestamped, merged into the
//! metadata and queued as a `CALL_STATE_CHANGED` event for the caller to
//! drain with [`CallStateMachine::take_events`].

use crate::domain::call::event::{EventKind, TerminationEvent};
use crate::domain::call::metadata::CallMetadata;
use crate::domain::call::value_object::CallState;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::events::iso_timestamp;
use crate::domain::shared::result::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// An accepted state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: CallState,
    pub to: CallState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CallStateMachine {
    state: CallState,
    metadata: CallMetadata,
    history: Vec<StateTransition>,
    /// Pending events
    events: Vec<TerminationEvent>,
}

impl CallStateMachine {
    pub fn new() -> Self {
        Self {
            state: CallState::Idle,
            metadata: CallMetadata::new(),
            history: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Move to `to`, merging `metadata` into the call's metadata.
    ///
    /// Illegal moves (including any move out of ENDED or ERROR) are rejected
    /// and leave the machine untouched.
    pub fn transition(&mut self, to: CallState, metadata: CallMetadata) -> Result<StateTransition> {
        if !self.state.can_transition_to(to) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        let transition = StateTransition {
            from: self.state,
            to,
            at: Utc::now(),
        };
        self.state = to;
        self.history.push(transition);

        let mut payload = metadata.clone();
        payload.insert("from", transition.from.as_str());
        payload.insert("to", to.as_str());

        self.metadata.merge(metadata);
        self.metadata.insert(
            format!("{}_at", to.as_str().to_lowercase()),
            iso_timestamp(transition.at),
        );

        self.record_event(EventKind::CallStateChanged, payload.snapshot());

        Ok(transition)
    }

    /// Drive a live call into ERROR. Returns `false` if the call was already terminal.
    pub fn force_error(&mut self, metadata: CallMetadata) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.transition(CallState::Error, metadata).is_ok()
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn metadata(&self) -> &CallMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut CallMetadata {
        &mut self.metadata
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Queue a non-transition event stamped with the current state
    pub fn record_event(&mut self, kind: EventKind, metadata: Value) {
        self.events
            .push(TerminationEvent::new(kind, self.state, metadata));
    }

    /// Take all pending events
    pub fn take_events(&mut self) -> Vec<TerminationEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for CallStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn active_machine() -> CallStateMachine {
        let mut machine = CallStateMachine::new();
        machine.transition(CallState::Ringing, CallMetadata::new()).unwrap();
        machine.transition(CallState::Active, CallMetadata::new()).unwrap();
        machine
    }

    #[test]
    fn test_call_lifecycle() {
        let mut machine = active_machine();
        machine
            .transition(CallState::Terminating, CallMetadata::new().with("reason", "requested"))
            .unwrap();
        machine.transition(CallState::Ended, CallMetadata::new()).unwrap();

        assert_eq!(machine.state(), CallState::Ended);
        assert!(machine.is_terminal());

        let path: Vec<CallState> = machine.history().iter().map(|t| t.to).collect();
        assert_eq!(
            path,
            vec![CallState::Ringing, CallState::Active, CallState::Terminating, CallState::Ended]
        );

        let events = machine.take_events();
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.event == EventKind::CallStateChanged));
        assert_eq!(events[2].field("reason"), Some(&json!("requested")));
        assert_eq!(events[2].field("from"), Some(&json!("ACTIVE")));
        assert!(machine.take_events().is_empty());
    }

    #[test]
    fn test_invalid_transition_is_reported() {
        let mut machine = CallStateMachine::new();
        let err = machine
            .transition(CallState::Active, CallMetadata::new())
            .unwrap_err();

        assert_eq!(
            err,
            DomainError::InvalidStateTransition {
                from: "IDLE".to_string(),
                to: "ACTIVE".to_string()
            }
        );
        assert_eq!(machine.state(), CallState::Idle);
        assert!(machine.history().is_empty());
        assert!(machine.take_events().is_empty());
    }

    #[test]
    fn test_cannot_transition_from_ended() {
        let mut machine = active_machine();
        machine.transition(CallState::Terminating, CallMetadata::new()).unwrap();
        machine.transition(CallState::Ended, CallMetadata::new()).unwrap();

        assert!(machine.transition(CallState::Terminating, CallMetadata::new()).is_err());
        assert!(machine.transition(CallState::Error, CallMetadata::new()).is_err());
        assert!(!machine.force_error(CallMetadata::new()));
        assert_eq!(machine.state(), CallState::Ended);
    }

    #[test]
    fn test_metadata_is_merged_and_timestamped() {
        let mut machine = CallStateMachine::new();
        machine
            .transition(CallState::Ringing, CallMetadata::new().with("caller", "alice"))
            .unwrap();
        machine
            .transition(CallState::Active, CallMetadata::new().with("codec", "opus"))
            .unwrap();

        let meta = machine.metadata();
        assert_eq!(meta.get("caller"), Some(&json!("alice")));
        assert_eq!(meta.get("codec"), Some(&json!("opus")));
        assert!(meta.contains_key("ringing_at"));
        assert!(meta.contains_key("active_at"));
    }

    #[test]
    fn test_force_error_from_any_live_state() {
        let mut machine = CallStateMachine::new();
        assert!(machine.force_error(CallMetadata::new().with("error", "setup failed")));
        assert_eq!(machine.state(), CallState::Error);
        assert_eq!(machine.metadata().get("error"), Some(&json!("setup failed")));
    }
}
