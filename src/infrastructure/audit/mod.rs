/// Structured call lifecycle records
pub mod logger;

pub use logger::{EventQuery, FanoutEventSink, MemoryEventSink, TracingEventSink};
