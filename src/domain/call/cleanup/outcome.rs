//! Step outcomes consumed by the escalation loop

use serde::{Deserialize, Serialize};

/// How bad a failed step was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Did not fully succeed, call can still end normally
    Warning,
    /// Unexpected error condition, needs a harder tier
    Critical,
}

/// Result of one cleanup action or a whole tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Warning(String),
    Critical(String),
}

impl StepOutcome {
    pub fn severity(&self) -> Option<Severity> {
        match self {
            StepOutcome::Success => None,
            StepOutcome::Warning(_) => Some(Severity::Warning),
            StepOutcome::Critical(_) => Some(Severity::Critical),
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            StepOutcome::Success => None,
            StepOutcome::Warning(detail) | StepOutcome::Critical(detail) => Some(detail),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success)
    }

    pub fn status(&self) -> &'static str {
        match self {
            StepOutcome::Success => "success",
            StepOutcome::Warning(_) => "warning",
            StepOutcome::Critical(_) => "critical",
        }
    }

    /// Combine two outcomes of the same tier, keeping the worse one.
    /// Details of equal severity are joined.
    pub fn and(self, other: StepOutcome) -> StepOutcome {
        match (self.severity(), other.severity()) {
            (None, _) => other,
            (_, None) => self,
            (Some(a), Some(b)) if a > b => self,
            (Some(a), Some(b)) if a < b => other,
            _ => {
                let joined = format!(
                    "{}; {}",
                    self.detail().unwrap_or_default(),
                    other.detail().unwrap_or_default()
                );
                match self {
                    StepOutcome::Critical(_) => StepOutcome::Critical(joined),
                    _ => StepOutcome::Warning(joined),
                }
            }
        }
    }
}
