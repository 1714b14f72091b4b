//! Tiered cleanup: standard → forced → emergency → catastrophic

pub mod chain;
pub mod context;
pub mod outcome;
pub mod tier;

pub use chain::{CleanupChain, CleanupReport, TierRun};
pub use context::{CallResources, CleanupContext};
pub use outcome::{Severity, StepOutcome};
pub use tier::{CatastrophicCleanup, CleanupTier, EmergencyCleanup, ForcedCleanup, StandardCleanup};
