//! # Service-side command surface.
//!
//! A subsystem's service implements [`SystemService`] to receive dispatched
//! commands. [`CommandTable`] is the usual implementation vehicle: methods
//! register under their short names and `invoke` routes by name.

use std::collections::HashMap;

use crate::error::{ResultCode, SysResult, SystemError};

use super::message::Message;

/// Target of command dispatch, resolved from the IoC container by
/// subsystem name.
pub trait SystemService: Send + Sync {
    /// Invokes the named command with its arguments.
    fn invoke(&self, command: &str, args: &Message) -> SysResult<()>;
}

type Handler = Box<dyn Fn(&Message) -> SysResult<()> + Send + Sync>;

/// Name-indexed handler table for services.
#[derive(Default)]
pub struct CommandTable {
    handlers: HashMap<String, Handler>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its short command name.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(&Message) -> SysResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.handlers.insert(name.into(), Box::new(handler));
        self
    }

    /// Routes a command to its handler.
    pub fn invoke(&self, command: &str, args: &Message) -> SysResult<()> {
        match self.handlers.get(command) {
            Some(handler) => handler(args),
            None => Err(SystemError::with(
                ResultCode::NotFound,
                format!("no handler for command '{command}'"),
            )),
        }
    }
}
