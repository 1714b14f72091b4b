//! Domain errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Call {0} has been retired and cannot be reused")]
    CallRetired(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
