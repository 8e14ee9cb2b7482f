//! # Platform runtime events.
//!
//! Host components publish lifecycle events on a shared [`Bus`]:
//! - **Composition events**: subsystem load/unload and lifecycle failures
//! - **Mode events**: system mode changes and per-subsystem rejections
//! - **Command events**: dispatch outcomes and manifest-declared emissions
//! - **Pool events**: queue drops
//!
//! The bus is broadcast-based and non-persistent; the platform operates the
//! same with zero subscribers. [`Subscribe`] is the extension point for
//! observers (logging, metrics, bridging to an external message bus).

mod bus;
mod event;
mod subscribe;

pub use bus::Bus;
pub use event::{Event, EventKind};
pub use subscribe::{spawn_listener, Subscribe};
