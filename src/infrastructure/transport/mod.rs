//! In-process transport and speech adapters
//!
//! Used by the demo binary and the integration tests in place of a real
//! media room and speech pipeline.

pub mod loopback;
pub mod speech;

pub use loopback::{DisconnectBehavior, LoopbackTransport};
pub use speech::ScriptedSpeech;
