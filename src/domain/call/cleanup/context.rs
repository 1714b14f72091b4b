//! State a cleanup tier may touch

use crate::domain::call::event::EventKind;
use crate::domain::call::metadata::CallMetadata;
use crate::domain::call::port::{SpeechChannel, Transport};
use crate::domain::call::state_machine::CallStateMachine;
use crate::domain::call::value_object::TerminationReason;
use crate::domain::shared::value_objects::CallId;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::error::Elapsed;
use tracing::warn;

/// References and flags held for one call
#[derive(Clone, Default)]
pub struct CallResources {
    pub transport: Option<Arc<dyn Transport>>,
    pub speech: Option<Arc<dyn SpeechChannel>>,
    pub is_listening: bool,
    pub is_speaking: bool,
    /// Set once the call may never be driven again
    pub retired: bool,
}

impl CallResources {
    pub fn new(transport: Arc<dyn Transport>, speech: Arc<dyn SpeechChannel>) -> Self {
        Self {
            transport: Some(transport),
            speech: Some(speech),
            is_listening: false,
            is_speaking: false,
            retired: false,
        }
    }

    /// Drop every held reference without asking the collaborators anything
    pub fn discard(&mut self) {
        self.transport = None;
        self.speech = None;
        self.is_listening = false;
        self.is_speaking = false;
    }

    pub fn holds_references(&self) -> bool {
        self.transport.is_some() || self.speech.is_some()
    }
}

impl std::fmt::Debug for CallResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallResources")
            .field("transport", &self.transport.is_some())
            .field("speech", &self.speech.is_some())
            .field("is_listening", &self.is_listening)
            .field("is_speaking", &self.is_speaking)
            .field("retired", &self.retired)
            .finish()
    }
}

pub struct CleanupContext<'a> {
    pub call_id: CallId,
    pub reason: TerminationReason,
    pub machine: &'a mut CallStateMachine,
    pub resources: &'a mut CallResources,
    /// Bound for every collaborator await made by a tier
    pub timeout: Duration,
    /// Detail of the failure that caused the current tier to run
    pub cause: Option<String>,
}

impl<'a> CleanupContext<'a> {
    pub fn new(
        call_id: CallId,
        reason: TerminationReason,
        machine: &'a mut CallStateMachine,
        resources: &'a mut CallResources,
        timeout: Duration,
    ) -> Self {
        Self {
            call_id,
            reason,
            machine,
            resources,
            timeout,
            cause: None,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut CallMetadata {
        self.machine.metadata_mut()
    }

    /// Emit a `TERMINATION_STEP` record
    pub fn step(&mut self, step: &str, status: &str) {
        self.machine
            .record_event(EventKind::TerminationStep, json!({ "step": step, "status": status }));
    }

    pub fn warn(&mut self, key: &str, detail: impl Into<String>) {
        let detail = detail.into();
        warn!(call_id = %self.call_id, step = key, "{}", detail);
        self.metadata_mut().record_warning(key, detail);
    }

    pub fn fail(&mut self, key: &str, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::error!(call_id = %self.call_id, step = key, "{}", detail);
        self.metadata_mut().record_error(key, detail);
    }

    /// Await a collaborator call, giving up after `self.timeout`
    pub async fn bounded<F: Future>(&self, future: F) -> Result<F::Output, Elapsed> {
        tokio::time::timeout(self.timeout, future).await
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}
