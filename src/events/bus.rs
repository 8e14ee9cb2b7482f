//! # Broadcast bus for platform events.
//!
//! Thin wrapper around [`tokio::sync::broadcast`]: every active subscriber
//! receives a clone of each published event, publishing never blocks, and
//! events are dropped silently when nobody listens. Bounded capacity; slow
//! subscribers observe `Lagged` and skip old events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for platform events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Default ring-buffer capacity.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a bus with the given channel capacity (clamped to 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// Dropped silently when there are no subscribers; the platform is
    /// expected to operate without observers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver for all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
