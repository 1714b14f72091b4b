//! Cleanup tiers, from gentle to unconditional

use crate::domain::call::cleanup::context::CleanupContext;
use crate::domain::call::cleanup::outcome::{Severity, StepOutcome};
use crate::domain::call::metadata::CallMetadata;
use crate::domain::call::port::TransportError;
use crate::domain::call::value_object::CallState;
use async_trait::async_trait;
use tracing::{debug, error, info};

/// One rung of the escalation ladder
#[async_trait]
pub trait CleanupTier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this tier answers a failure of `severity` left by an earlier tier.
    /// The first tier of a chain always runs.
    fn handles(&self, severity: Severity) -> bool;

    async fn attempt(&self, ctx: &mut CleanupContext<'_>) -> StepOutcome;
}

/// Tier 1: enter TERMINATING, disconnect gracefully, release per-call state
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCleanup;

/// Tier 2: hard-abort the transport
#[derive(Debug, Clone, Copy, Default)]
pub struct ForcedCleanup;

/// Tier 3: drop every reference and push the call to a terminal state
#[derive(Debug, Clone, Copy, Default)]
pub struct EmergencyCleanup;

/// Tier 4: force ERROR and retire the call; touches nothing external
#[derive(Debug, Clone, Copy, Default)]
pub struct CatastrophicCleanup;

#[async_trait]
impl CleanupTier for StandardCleanup {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn handles(&self, _severity: Severity) -> bool {
        false
    }

    async fn attempt(&self, ctx: &mut CleanupContext<'_>) -> StepOutcome {
        match ctx.machine.state() {
            CallState::Terminating => {
                debug!(call_id = %ctx.call_id, "Resuming interrupted termination");
            }
            state if state.is_terminal() => return StepOutcome::Success,
            _ => {
                let metadata = CallMetadata::new().with("reason", ctx.reason.as_str());
                if let Err(e) = ctx.machine.transition(CallState::Terminating, metadata) {
                    ctx.fail("state_transition", e.to_string());
                    return StepOutcome::Critical(e.to_string());
                }
            }
        }

        let disconnect = disconnect_gracefully(ctx).await;
        if let StepOutcome::Critical(_) = disconnect {
            return disconnect;
        }

        disconnect.and(release_speech(ctx).await)
    }
}

async fn disconnect_gracefully(ctx: &mut CleanupContext<'_>) -> StepOutcome {
    let Some(transport) = ctx.resources.transport.clone() else {
        debug!(call_id = %ctx.call_id, "No room to disconnect from");
        ctx.step("room_disconnected", "skipped");
        return StepOutcome::Success;
    };

    if !transport.is_connected() {
        debug!(call_id = %ctx.call_id, "Room already disconnected");
        ctx.resources.transport = None;
        ctx.step("room_disconnected", "already_disconnected");
        return StepOutcome::Success;
    }

    let result = match ctx.bounded(transport.disconnect()).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(ctx.timeout_ms())),
    };

    match result {
        Ok(()) => {
            info!(call_id = %ctx.call_id, "Disconnected from room");
            ctx.resources.transport = None;
            ctx.step("room_disconnected", "success");
            StepOutcome::Success
        }
        Err(e) if e.is_critical() => {
            ctx.fail("room_disconnect", e.to_string());
            ctx.step("room_disconnected", "critical");
            StepOutcome::Critical(e.to_string())
        }
        Err(e) => {
            ctx.warn("room_disconnect", e.to_string());
            ctx.step("room_disconnected", "warning");
            StepOutcome::Warning(e.to_string())
        }
    }
}

async fn release_speech(ctx: &mut CleanupContext<'_>) -> StepOutcome {
    ctx.resources.is_listening = false;
    ctx.resources.is_speaking = false;

    let Some(speech) = ctx.resources.speech.clone() else {
        ctx.step("resources_cleaned", "success");
        return StepOutcome::Success;
    };

    let result = match ctx.bounded(speech.close()).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!("speech channel close timed out after {} ms", ctx.timeout_ms())),
    };

    match result {
        Ok(()) => {
            ctx.resources.speech = None;
            ctx.step("resources_cleaned", "success");
            StepOutcome::Success
        }
        Err(detail) => {
            ctx.warn("resource_cleanup", detail.clone());
            ctx.step("resources_cleaned", "warning");
            StepOutcome::Warning(detail)
        }
    }
}

#[async_trait]
impl CleanupTier for ForcedCleanup {
    fn name(&self) -> &'static str {
        "forced"
    }

    fn handles(&self, severity: Severity) -> bool {
        severity == Severity::Warning
    }

    async fn attempt(&self, ctx: &mut CleanupContext<'_>) -> StepOutcome {
        info!(call_id = %ctx.call_id, "Performing forced room cleanup");

        // The speech channel already failed to close gracefully; stop holding it.
        ctx.resources.speech = None;

        let Some(transport) = ctx.resources.transport.take() else {
            ctx.step("room_force_cleaned", "success");
            return StepOutcome::Success;
        };

        let result = match ctx.bounded(transport.force_disconnect()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(ctx.timeout_ms())),
        };

        match result {
            Ok(()) => {
                info!(call_id = %ctx.call_id, "Forced room cleanup completed");
                ctx.step("room_force_cleaned", "success");
                StepOutcome::Success
            }
            Err(e) if e.is_critical() => {
                ctx.fail("room_force_cleanup", e.to_string());
                ctx.step("room_force_cleaned", "critical");
                StepOutcome::Critical(e.to_string())
            }
            Err(e) => {
                ctx.warn("room_force_cleanup", e.to_string());
                ctx.step("room_force_cleaned", "warning");
                StepOutcome::Warning(e.to_string())
            }
        }
    }
}

#[async_trait]
impl CleanupTier for EmergencyCleanup {
    fn name(&self) -> &'static str {
        "emergency"
    }

    fn handles(&self, severity: Severity) -> bool {
        severity == Severity::Critical
    }

    async fn attempt(&self, ctx: &mut CleanupContext<'_>) -> StepOutcome {
        error!(
            call_id = %ctx.call_id,
            cause = ctx.cause.as_deref().unwrap_or("unknown"),
            "Performing emergency resource cleanup"
        );

        ctx.resources.discard();

        let state = ctx.machine.state();
        if state.is_terminal() {
            ctx.step("emergency_cleanup", "success");
            return StepOutcome::Success;
        }

        let metadata = CallMetadata::new().with("forced", true);
        match ctx.machine.transition(CallState::Ended, metadata) {
            Ok(_) => {
                ctx.step("emergency_cleanup", "success");
                StepOutcome::Success
            }
            Err(e) => {
                let detail = format!("emergency cleanup could not end call: {}", e);
                ctx.fail("emergency_cleanup", detail.clone());
                ctx.step("emergency_cleanup", "critical");
                StepOutcome::Critical(detail)
            }
        }
    }
}

#[async_trait]
impl CleanupTier for CatastrophicCleanup {
    fn name(&self) -> &'static str {
        "catastrophic"
    }

    fn handles(&self, severity: Severity) -> bool {
        severity == Severity::Critical
    }

    async fn attempt(&self, ctx: &mut CleanupContext<'_>) -> StepOutcome {
        error!(call_id = %ctx.call_id, "Performing catastrophic failure cleanup");

        force_retire(ctx);
        ctx.step("catastrophic_cleanup", "success");
        StepOutcome::Success
    }
}

/// Drop everything, mark the call unusable and force ERROR. Cannot fail.
pub(crate) fn force_retire(ctx: &mut CleanupContext<'_>) {
    ctx.resources.discard();
    ctx.resources.retired = true;

    let cause = ctx
        .cause
        .clone()
        .unwrap_or_else(|| "catastrophic termination failure".to_string());
    ctx.machine
        .force_error(CallMetadata::new().with("error", cause));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call::cleanup::context::CallResources;
    use crate::domain::call::port::{MockSpeechChannel, MockTransport, SpeechError};
    use crate::domain::call::state_machine::CallStateMachine;
    use crate::domain::call::value_object::TerminationReason;
    use crate::domain::shared::value_objects::CallId;
    use std::sync::Arc;
    use std::time::Duration;

    fn active_machine() -> CallStateMachine {
        let mut machine = CallStateMachine::new();
        machine.transition(CallState::Ringing, CallMetadata::new()).unwrap();
        machine.transition(CallState::Active, CallMetadata::new()).unwrap();
        machine
    }

    fn quiet_speech() -> MockSpeechChannel {
        let mut speech = MockSpeechChannel::new();
        speech.expect_close().returning(|| Ok(()));
        speech
    }

    fn resources(transport: MockTransport, speech: MockSpeechChannel) -> CallResources {
        CallResources::new(Arc::new(transport), Arc::new(speech))
    }

    #[tokio::test]
    async fn test_standard_cleanup_success() {
        let mut transport = MockTransport::new();
        transport.expect_is_connected().return_const(true);
        transport.expect_disconnect().times(1).returning(|| Ok(()));

        let mut machine = active_machine();
        let mut res = resources(transport, quiet_speech());
        let mut ctx = CleanupContext::new(
            CallId::new(),
            TerminationReason::Requested,
            &mut machine,
            &mut res,
            Duration::from_secs(5),
        );

        let outcome = StandardCleanup.attempt(&mut ctx).await;

        assert_eq!(outcome, StepOutcome::Success);
        assert_eq!(machine.state(), CallState::Terminating);
        assert!(!res.holds_references());
    }

    #[tokio::test]
    async fn test_standard_cleanup_disconnect_failure_is_warning() {
        let mut transport = MockTransport::new();
        transport.expect_is_connected().return_const(true);
        transport
            .expect_disconnect()
            .returning(|| Err(TransportError::Failed("connection reset".into())));

        let mut machine = active_machine();
        let mut res = resources(transport, quiet_speech());
        let mut ctx = CleanupContext::new(
            CallId::new(),
            TerminationReason::Requested,
            &mut machine,
            &mut res,
            Duration::from_secs(5),
        );

        let outcome = StandardCleanup.attempt(&mut ctx).await;

        assert_eq!(outcome.severity(), Some(Severity::Warning));
        assert!(res.transport.is_some(), "transport kept for forced tier");
        assert_eq!(
            machine.metadata().warning("room_disconnect"),
            Some("transport operation failed: connection reset")
        );
    }

    #[tokio::test]
    async fn test_standard_cleanup_skips_disconnected_transport() {
        let mut transport = MockTransport::new();
        transport.expect_is_connected().return_const(false);
        transport.expect_disconnect().never();

        let mut machine = active_machine();
        let mut res = resources(transport, quiet_speech());
        let mut ctx = CleanupContext::new(
            CallId::new(),
            TerminationReason::RemoteHangup,
            &mut machine,
            &mut res,
            Duration::from_secs(5),
        );

        assert!(StandardCleanup.attempt(&mut ctx).await.is_success());
        assert_eq!(machine.metadata().get("reason"), Some(&serde_json::json!("remote_hangup")));
    }

    #[tokio::test]
    async fn test_standard_cleanup_from_ringing_is_critical() {
        let mut machine = CallStateMachine::new();
        machine.transition(CallState::Ringing, CallMetadata::new()).unwrap();
        let mut res = resources(MockTransport::new(), MockSpeechChannel::new());
        let mut ctx = CleanupContext::new(
            CallId::new(),
            TerminationReason::Requested,
            &mut machine,
            &mut res,
            Duration::from_secs(5),
        );

        let outcome = StandardCleanup.attempt(&mut ctx).await;

        assert_eq!(outcome.severity(), Some(Severity::Critical));
        assert!(machine.metadata().error("state_transition").is_some());
    }

    #[tokio::test]
    async fn test_speech_close_failure_is_warning() {
        let mut transport = MockTransport::new();
        transport.expect_is_connected().return_const(true);
        transport.expect_disconnect().returning(|| Ok(()));
        let mut speech = MockSpeechChannel::new();
        speech
            .expect_close()
            .returning(|| Err(SpeechError::Unavailable("pipeline gone".into())));

        let mut machine = active_machine();
        let mut res = resources(transport, speech);
        let mut ctx = CleanupContext::new(
            CallId::new(),
            TerminationReason::Requested,
            &mut machine,
            &mut res,
            Duration::from_secs(5),
        );

        let outcome = StandardCleanup.attempt(&mut ctx).await;

        assert_eq!(outcome.severity(), Some(Severity::Warning));
        assert!(machine.metadata().warning("resource_cleanup").is_some());
    }

    #[tokio::test]
    async fn test_forced_cleanup_drops_transport_even_on_failure() {
        let mut transport = MockTransport::new();
        transport
            .expect_force_disconnect()
            .times(1)
            .returning(|| Err(TransportError::Failed("already gone".into())));

        let mut machine = active_machine();
        let mut res = resources(transport, MockSpeechChannel::new());
        let mut ctx = CleanupContext::new(
            CallId::new(),
            TerminationReason::Requested,
            &mut machine,
            &mut res,
            Duration::from_secs(5),
        );

        let outcome = ForcedCleanup.attempt(&mut ctx).await;

        assert_eq!(outcome.severity(), Some(Severity::Warning));
        assert!(!res.holds_references());
        assert!(machine.metadata().warning("room_force_cleanup").is_some());
    }

    #[tokio::test]
    async fn test_emergency_cleanup_ends_terminating_call() {
        let mut machine = active_machine();
        machine.transition(CallState::Terminating, CallMetadata::new()).unwrap();
        let mut res = resources(MockTransport::new(), MockSpeechChannel::new());
        let mut ctx = CleanupContext::new(
            CallId::new(),
            TerminationReason::Requested,
            &mut machine,
            &mut res,
            Duration::from_secs(5),
        );

        assert!(EmergencyCleanup.attempt(&mut ctx).await.is_success());
        assert_eq!(machine.state(), CallState::Ended);
        assert!(!res.holds_references());
    }

    #[tokio::test]
    async fn test_emergency_cleanup_fails_when_end_unreachable() {
        let mut machine = CallStateMachine::new();
        let mut res = resources(MockTransport::new(), MockSpeechChannel::new());
        let mut ctx = CleanupContext::new(
            CallId::new(),
            TerminationReason::Requested,
            &mut machine,
            &mut res,
            Duration::from_secs(5),
        );

        let outcome = EmergencyCleanup.attempt(&mut ctx).await;

        assert_eq!(outcome.severity(), Some(Severity::Critical));
        assert!(!res.holds_references());
        assert_eq!(machine.state(), CallState::Idle);
    }

    #[tokio::test]
    async fn test_catastrophic_cleanup_forces_error() {
        let mut machine = active_machine();
        let mut res = resources(MockTransport::new(), MockSpeechChannel::new());
        let mut ctx = CleanupContext::new(
            CallId::new(),
            TerminationReason::Requested,
            &mut machine,
            &mut res,
            Duration::from_secs(5),
        );
        ctx.cause = Some("emergency cleanup could not end call".into());

        assert!(CatastrophicCleanup.attempt(&mut ctx).await.is_success());
        assert_eq!(machine.state(), CallState::Error);
        assert!(res.retired);
        assert_eq!(
            machine.metadata().get("error"),
            Some(&serde_json::json!("emergency cleanup could not end call"))
        );
    }
}
