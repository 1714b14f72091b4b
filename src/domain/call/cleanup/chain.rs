//! Escalation loop over an ordered list of cleanup tiers

use crate::domain::call::cleanup::context::CleanupContext;
use crate::domain::call::cleanup::outcome::{Severity, StepOutcome};
use crate::domain::call::cleanup::tier::{
    force_retire, CatastrophicCleanup, CleanupTier, EmergencyCleanup, ForcedCleanup,
    StandardCleanup,
};
use crate::domain::call::metadata::CallMetadata;
use crate::domain::call::value_object::CallState;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

/// Outcome of one tier during a chain run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierRun {
    pub tier: &'static str,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub tiers: Vec<TierRun>,
    /// The inline ERROR backstop had to run after the last tier
    pub backstop_used: bool,
}

impl CleanupReport {
    pub fn ran(&self, tier: &str) -> bool {
        self.tiers.iter().any(|run| run.tier == tier)
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|run| run.tier).collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.tiers.iter().all(|run| run.outcome.is_success())
    }
}

/// Ordered cleanup tiers driven by one escalation loop.
///
/// The first tier always runs. Every later tier runs only while a failure is
/// pending and only if it handles that failure's severity. A tier that panics
/// is treated as a critical failure. Whatever the tiers do, a run leaves the
/// call in ENDED or ERROR.
pub struct CleanupChain {
    tiers: Vec<Box<dyn CleanupTier>>,
}

impl CleanupChain {
    pub fn new(tiers: Vec<Box<dyn CleanupTier>>) -> Self {
        Self { tiers }
    }

    /// standard → forced → emergency → catastrophic
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(StandardCleanup),
            Box::new(ForcedCleanup),
            Box::new(EmergencyCleanup),
            Box::new(CatastrophicCleanup),
        ])
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|tier| tier.name()).collect()
    }

    pub async fn run(&self, ctx: &mut CleanupContext<'_>) -> CleanupReport {
        let mut report = CleanupReport::default();
        let mut pending: Option<(Severity, String)> = None;

        for (index, tier) in self.tiers.iter().enumerate() {
            if index > 0 {
                match &pending {
                    None => break,
                    Some((severity, _)) if !tier.handles(*severity) => continue,
                    Some(_) => {}
                }
            }

            ctx.cause = pending.as_ref().map(|(_, detail)| detail.clone());
            debug!(call_id = %ctx.call_id, tier = tier.name(), "Running cleanup tier");

            let outcome = match AssertUnwindSafe(tier.attempt(ctx)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let detail = format!("{} tier panicked: {}", tier.name(), panic_message(&*payload));
                    ctx.fail(tier.name(), detail.clone());
                    StepOutcome::Critical(detail)
                }
            };

            if !outcome.is_success() {
                warn!(
                    call_id = %ctx.call_id,
                    tier = tier.name(),
                    status = outcome.status(),
                    "Cleanup tier did not complete cleanly"
                );
            }

            pending = match &outcome {
                StepOutcome::Success => None,
                StepOutcome::Warning(detail) => Some((Severity::Warning, detail.clone())),
                StepOutcome::Critical(detail) => Some((Severity::Critical, detail.clone())),
            };
            report.tiers.push(TierRun {
                tier: tier.name(),
                outcome,
            });
        }

        if let Some((Severity::Critical, detail)) = pending {
            if !ctx.machine.is_terminal() {
                error!(call_id = %ctx.call_id, "Cleanup tiers exhausted, forcing ERROR");
                ctx.cause = Some(detail);
                force_retire(ctx);
                report.backstop_used = true;
            }
        }

        settle(ctx);
        report
    }
}

impl Default for CleanupChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for CleanupChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupChain")
            .field("tiers", &self.tier_names())
            .finish()
    }
}

/// Move a call left in TERMINATING to ENDED; anything else non-terminal goes to ERROR.
fn settle(ctx: &mut CleanupContext<'_>) {
    match ctx.machine.state() {
        state if state.is_terminal() => {}
        CallState::Terminating => {
            if let Err(e) = ctx.machine.transition(CallState::Ended, CallMetadata::new()) {
                ctx.cause = Some(e.to_string());
                force_retire(ctx);
            }
        }
        state => {
            ctx.cause = Some(format!("cleanup finished with call still {}", state));
            force_retire(ctx);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
