use crate::domain::call::port::{Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

/// How a disconnect request behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectBehavior {
    #[default]
    Clean,
    /// Never completes
    Hang,
    /// Returns a transport failure
    Fail,
    /// Returns an unexpected fault
    Fault,
    /// Panics inside the call
    Panic,
}

/// A room that lives entirely in memory
#[derive(Debug)]
pub struct LoopbackTransport {
    room: String,
    connected: AtomicBool,
    on_disconnect: DisconnectBehavior,
    on_force_disconnect: DisconnectBehavior,
    disconnect_calls: AtomicUsize,
    force_disconnect_calls: AtomicUsize,
}

impl LoopbackTransport {
    pub fn new(room: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            connected: AtomicBool::new(true),
            on_disconnect: DisconnectBehavior::Clean,
            on_force_disconnect: DisconnectBehavior::Clean,
            disconnect_calls: AtomicUsize::new(0),
            force_disconnect_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_disconnect(mut self, behavior: DisconnectBehavior) -> Self {
        self.on_disconnect = behavior;
        self
    }

    pub fn with_force_disconnect(mut self, behavior: DisconnectBehavior) -> Self {
        self.on_force_disconnect = behavior;
        self
    }

    /// Start out already disconnected
    pub fn detached(self) -> Self {
        self.connected.store(false, Ordering::SeqCst);
        self
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn force_disconnect_calls(&self) -> usize {
        self.force_disconnect_calls.load(Ordering::SeqCst)
    }

    async fn perform(&self, behavior: DisconnectBehavior, op: &str) -> Result<(), TransportError> {
        debug!(room = %self.room, op, ?behavior, "Loopback disconnect");
        match behavior {
            DisconnectBehavior::Clean => {
                self.connected.store(false, Ordering::SeqCst);
                Ok(())
            }
            DisconnectBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            DisconnectBehavior::Fail => Err(TransportError::Failed(format!(
                "room {} connection error",
                self.room
            ))),
            DisconnectBehavior::Fault => Err(TransportError::Fault(format!(
                "room {} is in an inconsistent state",
                self.room
            ))),
            DisconnectBehavior::Panic => panic!("{} on room {} panicked", op, self.room),
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.perform(self.on_disconnect, "disconnect").await
    }

    async fn force_disconnect(&self) -> Result<(), TransportError> {
        self.force_disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.perform(self.on_force_disconnect, "force_disconnect").await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
