//! Call bounded context - manages the lifecycle of calls

pub mod cleanup;
pub mod event;
pub mod metadata;
pub mod phrase;
pub mod port;
pub mod session;
pub mod state_machine;
pub mod value_object;

pub use cleanup::{CleanupChain, CleanupReport};
pub use event::{EventKind, TerminationEvent};
pub use metadata::CallMetadata;
pub use phrase::{acknowledgment_for, detect, TerminationPhraseSet, DEFAULT_TERMINATION_PHRASES};
pub use port::{EventSink, SinkError, SpeechChannel, SpeechError, Transport, TransportError};
pub use session::{CallSession, DurationSummary};
pub use state_machine::{CallStateMachine, StateTransition};
pub use value_object::{CallClassification, CallState, Disposition, TerminationReason};
