//! # Command dispatch.
//!
//! Thin glue over the IoC container: named commands arrive (typically from
//! the message bus), pass the **mode gate** and argument validation, and
//! are routed to the owning service resolved by subsystem name.
//!
//! ```text
//! dispatch(name, args)
//!   ├─► CommandRegistry lookup          → NotFound
//!   ├─► mode gate (SystemConfig)        → PermissionDenied
//!   ├─► argument presence/type check    → InvalidArgument
//!   ├─► IoC resolve service by name     → InvalidState
//!   └─► SystemService::invoke(name, args)
//! ```

mod dispatcher;
mod manifest;
mod message;
mod registry;
mod service;

pub use dispatcher::CommandDispatcher;
pub use manifest::CommandManifestLoader;
pub use message::{ArgType, ArgValue, Message};
pub use registry::{CommandInfo, CommandRegistry};
pub use service::{CommandTable, SystemService};
