//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Event sink implementations
//! - Loopback transport and speech adapters
//! - Tracing subscriber setup
//! - Prometheus metrics

pub mod audit;
pub mod logging;
pub mod metrics;
pub mod transport;
