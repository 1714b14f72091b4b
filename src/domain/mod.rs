//! Domain layer - Core business logic and rules
//!
//! This layer contains:
//! - The call state machine and its legal transitions
//! - Termination phrase detection and the session timer
//! - The tiered cleanup chain
//! - Ports for transport, speech and event sinks

pub mod call;
pub mod shared;

// Re-export commonly used types
pub use shared::{DomainError, Result};
