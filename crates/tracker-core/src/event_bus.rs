//! Event bus carrying host events to the tracker.
//!
//! Built on `tokio::broadcast`. Each subscriber sees every event in publish
//! order, which is what keeps per-session ordering intact downstream.

use crate::types::HostEvent;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Default capacity of the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// A host event stamped with the time it was published.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub event: HostEvent,
    pub received_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(event: HostEvent) -> Self {
        Self {
            event,
            received_at: Utc::now(),
        }
    }
}

/// Fan-out bus for host events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Envelope>,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(
        &self,
        event: HostEvent,
    ) -> Result<usize, broadcast::error::SendError<Envelope>> {
        self.sender.send(Envelope::new(event))
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
