//! # Event value and classification.
//!
//! Each event carries a globally unique, monotonically increasing sequence
//! number so observers can order events correctly even when they arrive
//! through async channels out of order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of platform events.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Composition ===
    /// A subsystem library was loaded and its controller registered.
    SubsystemLoaded,
    /// A subsystem failed to load (missing library, ABI mismatch, create failure).
    SubsystemLoadFailed,
    /// A subsystem was destroyed and its library closed.
    SubsystemUnloaded,
    /// A lifecycle fan-out operation failed for one subsystem.
    LifecycleFailed,

    // === Mode ===
    /// The system mode changed.
    ModeChanged,
    /// A subsystem rejected a mode broadcast.
    ModeRejected,

    // === Command ===
    /// A command was dispatched to its service.
    CommandDispatched,
    /// A command was rejected (unknown, mode-gated, invalid args, no service).
    CommandRejected,
    /// A manifest-declared emission topic fired after successful dispatch.
    CommandEmitted,

    // === Pool ===
    /// A pool refused or abandoned a task (queue full or retries exhausted).
    PoolTaskDropped,
}

/// Platform event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Subsystem name, if applicable.
    pub subsystem: Option<String>,
    /// Command or task name, if applicable.
    pub name: Option<String>,
    /// Mode name, if applicable.
    pub mode: Option<String>,
    /// Emission topic (`CommandEmitted`).
    pub topic: Option<String>,
    /// Error text, if the event represents a failure.
    pub error: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind with the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            subsystem: None,
            name: None,
            mode: None,
            topic: None,
            error: None,
        }
    }

    /// Attaches a subsystem name.
    pub fn with_subsystem(mut self, name: impl Into<String>) -> Self {
        self.subsystem = Some(name.into());
        self
    }

    /// Attaches a command or task name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a mode name.
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Attaches an emission topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }
}
