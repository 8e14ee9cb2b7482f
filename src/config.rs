//! # Shared system configuration.
//!
//! [`SystemConfig`] carries the system identity and the **current mode**,
//! the single value the command mode gate reads on every dispatch. It is
//! registered as a singleton in the service container so subsystems and the
//! dispatcher resolve the same instance.
//!
//! Mode is kept as a string: manifests may declare gating modes beyond the
//! ABI enum (e.g. `low_power`), and the command manifest matches on names.

use parking_lot::RwLock;

use crate::manifest::SystemManifest;
use crate::modes::SystemMode;

/// System identity and current operating mode.
pub struct SystemConfig {
    name: String,
    description: String,
    mode: RwLock<String>,
}

impl SystemConfig {
    /// Default mode used when a manifest does not set one.
    pub const DEFAULT_MODE: &'static str = "normal";

    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            mode: RwLock::new(Self::DEFAULT_MODE.to_string()),
        }
    }

    /// Builds the config from a loaded manifest's `system` block.
    pub fn from_manifest(manifest: &SystemManifest) -> Self {
        let cfg = Self::new(&manifest.system.name, &manifest.system.description);
        if !manifest.system.mode.is_empty() {
            *cfg.mode.write() = manifest.system.mode.clone();
        }
        cfg
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Current mode name.
    pub fn mode(&self) -> String {
        self.mode.read().clone()
    }

    /// Replaces the current mode name.
    pub fn set_mode(&self, mode: impl Into<String>) {
        *self.mode.write() = mode.into();
    }

    /// The ABI value of the current mode, when it is one of the ABI modes.
    pub fn abi_mode(&self) -> Option<SystemMode> {
        SystemMode::from_name(&self.mode())
    }
}
