//! Application layer - Use cases and application services
//!
//! This layer orchestrates domain objects to fulfill use cases.
//! It's responsible for:
//! - Driving one call through setup and teardown
//! - Publishing lifecycle events to the event sink
//! - Recording metrics for finished calls

pub mod call_controller;

pub use call_controller::{
    CallController, ControllerSettings, InputDisposition, TerminationReport,
    DEFAULT_DISCONNECT_TIMEOUT,
};
