//! Capability interfaces the call core consumes
//!
//! These are defined in the domain layer as traits (ports) and implemented
//! by adapters in the infrastructure layer or by test doubles.

use crate::domain::call::event::TerminationEvent;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport operation timed out after {0} ms")]
    Timeout(u64),

    #[error("transport operation failed: {0}")]
    Failed(String),

    #[error("transport fault: {0}")]
    Fault(String),
}

impl TransportError {
    /// Faults are unexpected conditions; everything else is a clean failure signal.
    pub fn is_critical(&self) -> bool {
        matches!(self, TransportError::Fault(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    #[error("speech channel unavailable: {0}")]
    Unavailable(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("event sink rejected record: {0}")]
pub struct SinkError(pub String);

/// Real-time room / media transport of one call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Graceful disconnect; may fail or hang
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Hard abort that does not depend on the remote end
    async fn force_disconnect(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

/// Text-to-speech and conversation pipeline of one call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechChannel: Send + Sync {
    async fn say(&self, text: &str) -> Result<(), SpeechError>;

    /// Let the conversation pipeline produce its next turn
    async fn generate_reply(&self) -> Result<(), SpeechError>;

    /// Release per-call execution state (pending turns, audio buffers)
    async fn close(&self) -> Result<(), SpeechError>;
}

/// Receiver of structured lifecycle records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: &TerminationEvent) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_faults_are_critical() {
        assert!(!TransportError::Timeout(5000).is_critical());
        assert!(!TransportError::Failed("refused".into()).is_critical());
        assert!(TransportError::Fault("socket poisoned".into()).is_critical());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TransportError::Timeout(5000).to_string(),
            "transport operation timed out after 5000 ms"
        );
        assert_eq!(
            SinkError("disk full".into()).to_string(),
            "event sink rejected record: disk full"
        );
    }
}
