//! Call controller - one instance per active call
//!
//! Receives finalized transcriptions, checks them for termination phrases,
//! drives the state machine through setup and teardown and forwards every
//! lifecycle record to the event sink. The public entry points never return
//! errors for termination: failures are absorbed by the cleanup chain and
//! surface only as the final state and the `warnings`/`errors` metadata.

use crate::domain::call::cleanup::{CallResources, CleanupChain, CleanupContext, CleanupReport};
use crate::domain::call::event::{EventKind, TerminationEvent};
use crate::domain::call::metadata::CallMetadata;
use crate::domain::call::phrase::{
    acknowledgment_for, TerminationPhraseSet, DEFAULT_FALLBACK_ACKNOWLEDGMENT,
};
use crate::domain::call::port::{EventSink, SpeechChannel, SpeechError, Transport};
use crate::domain::call::session::CallSession;
use crate::domain::call::state_machine::CallStateMachine;
use crate::domain::call::value_object::{CallState, Disposition, TerminationReason};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::events::iso_timestamp;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use crate::infrastructure::metrics;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, enabled, info, warn, Level};

/// Default bound for the graceful transport disconnect
pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Bound for the graceful disconnect and every other collaborator await
    pub disconnect_timeout: Duration,
    /// Spoken when a custom phrase has no dedicated acknowledgment
    pub fallback_acknowledgment: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
            fallback_acknowledgment: DEFAULT_FALLBACK_ACKNOWLEDGMENT.to_string(),
        }
    }
}

/// What `on_user_input` did with an utterance
#[derive(Debug, Clone, PartialEq)]
pub enum InputDisposition {
    /// Blank input, or the call is already over
    Ignored,
    /// No termination phrase; handed to the conversation pipeline
    Forwarded,
    /// A termination phrase ended the call
    Terminated(TerminationReport),
}

/// Final disposition of a `terminate` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminationReport {
    pub call_id: CallId,
    pub state: CallState,
    pub disposition: Disposition,
    pub reason: Option<TerminationReason>,
    pub detected_phrase: Option<String>,
    pub warnings: Map<String, Value>,
    pub errors: Map<String, Value>,
    pub duration_seconds: f64,
    /// Tiers that ran during this invocation; empty for a repeated call
    pub tiers: Vec<&'static str>,
    /// The call was already terminal when `terminate` was invoked
    pub already_terminated: bool,
}

pub struct CallController {
    call_id: CallId,
    phrases: Arc<TerminationPhraseSet>,
    chain: Arc<CleanupChain>,
    settings: ControllerSettings,
    machine: CallStateMachine,
    session: CallSession,
    resources: CallResources,
    sink: Arc<dyn EventSink>,
    reason: Option<TerminationReason>,
}

impl CallController {
    pub fn new(
        transport: Arc<dyn Transport>,
        speech: Arc<dyn SpeechChannel>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            call_id: CallId::new(),
            phrases: TerminationPhraseSet::defaults(),
            chain: Arc::new(CleanupChain::standard()),
            settings: ControllerSettings::default(),
            machine: CallStateMachine::new(),
            session: CallSession::new(),
            resources: CallResources::new(transport, speech),
            sink,
            reason: None,
        }
    }

    pub fn with_call_id(mut self, call_id: CallId) -> Self {
        self.call_id = call_id;
        self
    }

    /// Use a shared, pre-built phrase set
    pub fn with_phrases(mut self, phrases: Arc<TerminationPhraseSet>) -> Self {
        self.phrases = phrases;
        self
    }

    /// Use a custom phrase collection; `None` or an empty one keeps the defaults
    pub fn with_termination_phrases<I, S>(mut self, phrases: Option<I>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.phrases = TerminationPhraseSet::from_override(phrases)?;
        Ok(self)
    }

    pub fn with_cleanup_chain(mut self, chain: Arc<CleanupChain>) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.disconnect_timeout = timeout;
        self
    }

    /// IDLE -> RINGING
    pub async fn ring(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.machine.transition(CallState::Ringing, CallMetadata::new())?;
        self.flush_events().await;
        Ok(())
    }

    /// RINGING -> ACTIVE; starts the call timer and asks for a greeting
    pub async fn answer(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.machine.transition(CallState::Active, CallMetadata::new())?;

        if self.session.start() {
            if let Some(started_at) = self.session.started_at() {
                info!(call_id = %self.call_id, "Call started at {}", iso_timestamp(started_at));
            }
        }
        self.resources.is_listening = true;
        self.resources.is_speaking = false;
        self.flush_events().await;

        if let Some(speech) = self.resources.speech.clone() {
            if let Err(e) = self.guarded(speech.generate_reply()).await {
                warn!(call_id = %self.call_id, "Failed to generate greeting: {}", e);
                self.machine.metadata_mut().insert("greeting_error", e);
            }
        }

        Ok(())
    }

    /// Ring and answer in one step
    pub async fn accept(&mut self) -> Result<()> {
        if self.machine.state() == CallState::Idle {
            self.ring().await?;
        }
        self.answer().await
    }

    /// Handle one finalized transcription
    pub async fn on_user_input(&mut self, text: &str) -> InputDisposition {
        if text.trim().is_empty() {
            return InputDisposition::Ignored;
        }

        // A termination already in flight is resumed through `terminate`, never by more input.
        if self.machine.is_terminal()
            || self.machine.state() == CallState::Terminating
            || self.resources.retired
        {
            debug!(call_id = %self.call_id, state = %self.machine.state(), "Ignoring input on ending call");
            return InputDisposition::Ignored;
        }

        if enabled!(Level::DEBUG) {
            debug!(call_id = %self.call_id, input_text = text, "Processing user input");
        }

        let detected = self.phrases.detect(text).map(str::to_string);
        match detected {
            Some(phrase) => {
                metrics::record_phrase_detected();
                self.machine
                    .metadata_mut()
                    .insert_once("detected_phrase", phrase.clone());
                self.machine.record_event(
                    EventKind::PhraseDetected,
                    json!({ "phrase": phrase, "input_text": text }),
                );
                self.flush_events().await;

                self.acknowledge(&phrase).await;
                let report = self.terminate_with(TerminationReason::PhraseDetected).await;
                InputDisposition::Terminated(report)
            }
            None => self.forward_downstream(text).await,
        }
    }

    /// Upstream request to end the call
    pub async fn terminate(&mut self) -> TerminationReport {
        self.terminate_with(TerminationReason::Requested).await
    }

    /// The far end left; tear down whatever is left on our side
    pub async fn on_remote_disconnect(&mut self) -> TerminationReport {
        self.terminate_with(TerminationReason::RemoteHangup).await
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn state(&self) -> CallState {
        self.machine.state()
    }

    pub fn metadata(&self) -> &CallMetadata {
        self.machine.metadata()
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn phrases(&self) -> &TerminationPhraseSet {
        &self.phrases
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn history(&self) -> Vec<CallState> {
        self.machine.history().iter().map(|t| t.to).collect()
    }

    pub fn is_listening(&self) -> bool {
        self.resources.is_listening
    }

    /// Still holding a transport or speech reference
    pub fn holds_resources(&self) -> bool {
        self.resources.holds_references()
    }

    /// Retired calls refuse every further lifecycle operation
    pub fn is_retired(&self) -> bool {
        self.resources.retired
    }

    async fn terminate_with(&mut self, reason: TerminationReason) -> TerminationReport {
        if self.machine.is_terminal() {
            warn!(call_id = %self.call_id, state = %self.machine.state(), "Call already ended, ignoring termination request");
            return self.report(Vec::new(), true);
        }

        let reason = *self.reason.get_or_insert(reason);
        info!(call_id = %self.call_id, reason = reason.as_str(), "Terminating call");
        self.machine.record_event(
            EventKind::TerminationInitiated,
            json!({ "reason": reason.as_str() }),
        );
        self.flush_events().await;

        let cleanup = {
            let mut ctx = CleanupContext::new(
                self.call_id,
                reason,
                &mut self.machine,
                &mut self.resources,
                self.settings.disconnect_timeout,
            );
            self.chain.run(&mut ctx).await
        };
        for run in &cleanup.tiers {
            metrics::record_cleanup_tier(run.tier, run.outcome.status());
        }
        self.flush_events().await;

        self.finish(reason, &cleanup).await
    }

    async fn finish(&mut self, reason: TerminationReason, cleanup: &CleanupReport) -> TerminationReport {
        if self.session.stop() {
            if let Some(ended_at) = self.session.ended_at() {
                info!(call_id = %self.call_id, "Call ended at {}", iso_timestamp(ended_at));
            }
        }

        let summary = self.session.summary();
        let metadata = self.machine.metadata_mut();
        metadata.insert("duration", summary.duration_seconds);
        metadata.insert(
            "duration_summary",
            serde_json::to_value(&summary).unwrap_or(Value::Null),
        );

        let report = self.report(cleanup.tier_names(), false);

        if report.state == CallState::Error {
            let cause = self
                .machine
                .metadata()
                .get("error")
                .cloned()
                .unwrap_or(Value::Null);
            self.machine.record_event(
                EventKind::CallError,
                json!({ "reason": reason.as_str(), "error": cause, "errors": report.errors }),
            );
        }

        self.machine.record_event(
            EventKind::CallTerminated,
            json!({
                "status": report.disposition.as_str(),
                "reason": reason.as_str(),
                "warnings": report.warnings,
                "errors": report.errors,
                "tiers": report.tiers,
                "duration_seconds": summary.duration_seconds,
                "duration_formatted": summary.duration_formatted,
                "classification": summary.classification,
            }),
        );
        self.flush_events().await;

        if self.session.is_complete() {
            info!(
                call_id = %self.call_id,
                "Call duration summary: {} ({:.3} seconds) - classified as {} call",
                summary.duration_formatted,
                summary.duration_seconds,
                summary.classification.as_str()
            );
        } else {
            warn!(call_id = %self.call_id, "Cannot log duration summary: no start time recorded");
        }

        metrics::record_call_terminated(report.disposition.as_str(), summary.duration_seconds);

        match report.disposition {
            Disposition::Success => info!(call_id = %self.call_id, "Call terminated"),
            Disposition::SuccessWithWarnings => warn!(
                call_id = %self.call_id,
                warnings = ?report.warnings,
                errors = ?report.errors,
                "Call terminated with partial failures"
            ),
            Disposition::Failure => tracing::error!(
                call_id = %self.call_id,
                errors = ?report.errors,
                "Call termination failed, call left in ERROR"
            ),
        }

        report
    }

    fn report(&self, tiers: Vec<&'static str>, already_terminated: bool) -> TerminationReport {
        let metadata = self.machine.metadata();
        let state = self.machine.state();

        let disposition = if state == CallState::Error {
            Disposition::Failure
        } else if metadata.has_warnings() || metadata.has_errors() {
            Disposition::SuccessWithWarnings
        } else {
            Disposition::Success
        };

        TerminationReport {
            call_id: self.call_id,
            state,
            disposition,
            reason: self.reason,
            detected_phrase: metadata
                .get("detected_phrase")
                .and_then(Value::as_str)
                .map(str::to_string),
            warnings: metadata.warnings(),
            errors: metadata.errors(),
            duration_seconds: self.session.duration(),
            tiers,
            already_terminated,
        }
    }

    async fn acknowledge(&mut self, phrase: &str) {
        let Some(speech) = self.resources.speech.clone() else {
            debug!(call_id = %self.call_id, "No active session for immediate response");
            return;
        };

        let response = acknowledgment_for(phrase, &self.settings.fallback_acknowledgment).to_string();
        self.resources.is_speaking = true;
        let result = self.guarded(speech.say(&response)).await;
        self.resources.is_speaking = false;

        match result {
            Ok(()) => {
                debug!(call_id = %self.call_id, response = %response, "Sent immediate termination response");
                self.machine.metadata_mut().insert("acknowledgment", response);
            }
            Err(e) => {
                warn!(call_id = %self.call_id, "Error sending immediate termination response: {}", e);
                self.machine.metadata_mut().insert("acknowledgment_error", e);
            }
        }
    }

    async fn forward_downstream(&mut self, text: &str) -> InputDisposition {
        if self.machine.state() != CallState::Active {
            debug!(call_id = %self.call_id, state = %self.machine.state(), "Skipping reply - call is not active");
            return InputDisposition::Ignored;
        }

        let Some(speech) = self.resources.speech.clone() else {
            return InputDisposition::Ignored;
        };

        if let Err(e) = self.guarded(speech.generate_reply()).await {
            warn!(call_id = %self.call_id, input_text = text, "Error generating reply: {}", e);
        }
        InputDisposition::Forwarded
    }

    /// Await a speech-channel call with the configured bound, absorbing panics
    async fn guarded<F>(&self, future: F) -> std::result::Result<(), String>
    where
        F: Future<Output = std::result::Result<(), SpeechError>>,
    {
        let bounded = tokio::time::timeout(self.settings.disconnect_timeout, future);
        match AssertUnwindSafe(bounded).catch_unwind().await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(_)) => Err(format!(
                "speech channel timed out after {} ms",
                self.settings.disconnect_timeout.as_millis()
            )),
            Err(_) => Err("speech channel panicked".to_string()),
        }
    }

    async fn flush_events(&mut self) {
        for event in self.machine.take_events() {
            self.deliver(&event).await;
        }
    }

    async fn deliver(&self, event: &TerminationEvent) {
        let delivery = tokio::time::timeout(self.settings.disconnect_timeout, self.sink.record(event));
        match AssertUnwindSafe(delivery).catch_unwind().await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(call_id = %self.call_id, event = %event.event, "Failed to log call event: {}", e),
            Ok(Err(_)) => warn!(call_id = %self.call_id, event = %event.event, "Event sink timed out"),
            Err(_) => warn!(call_id = %self.call_id, event = %event.event, "Event sink panicked"),
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.resources.retired {
            return Err(DomainError::CallRetired(self.call_id.to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("call_id", &self.call_id)
            .field("state", &self.machine.state())
            .field("resources", &self.resources)
            .field("chain", &self.chain)
            .finish()
    }
}
