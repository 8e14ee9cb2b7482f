//! # Command registry.
//!
//! Shared `command name → CommandInfo` table, filled from command manifests
//! at composition time and consulted by the dispatcher on every dispatch.
//! Duplicate names are ignored with a warning; the first registration stays
//! authoritative.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::warn;

use super::message::ArgType;

/// Everything the dispatcher needs to know about one command.
#[derive(Debug, Clone, Default)]
pub struct CommandInfo {
    /// Short command name (`Sample`, not `cmdSample`).
    pub name: String,
    /// Owning subsystem name; the dispatcher resolves the service under it.
    pub service: String,
    /// Mode names the command is allowed in.
    pub allowed_modes: HashSet<String>,
    /// Required arguments and their declared types.
    pub arg_types: HashMap<String, ArgType>,
    /// Event topics emitted after successful dispatch.
    pub emit: Vec<String>,
    pub description: String,
}

/// Shared name-indexed command table.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, CommandInfo>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds commands; duplicates are warned about and skipped.
    pub fn register_commands(&self, list: Vec<CommandInfo>) {
        let mut commands = self.commands.write();
        for cmd in list {
            if commands.contains_key(&cmd.name) {
                warn!(command = %cmd.name, "duplicate command ignored");
                continue;
            }
            commands.insert(cmd.name.clone(), cmd);
        }
    }

    /// Looks a command up by name.
    pub fn find(&self, name: &str) -> Option<CommandInfo> {
        self.commands.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }
}
