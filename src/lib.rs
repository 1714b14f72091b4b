//! Callkeeper - call termination for real-time voice agents
//!
//! Detects spoken termination phrases, drives each call through a guarded
//! lifecycle state machine and tears it down through a tiered cleanup chain
//! that always leaves the call ENDED or ERROR.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{CallController, InputDisposition, TerminationReport};
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
