//! # System manifest.
//!
//! Declarative model of the host's configuration: platforms, modes,
//! restart policies, system identity, hosts, and the ordered subsystem
//! list. After loading, subsystems are sorted by descending priority;
//! manifest order is preserved on ties (stable sort), and that order drives
//! every manager fan-out.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ManifestError;

/// One host entry under `hosts`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostInfo {
    /// Execution entry path (e.g. `hosts/gui/dashboard`).
    #[serde(default)]
    pub entry: String,
}

/// One subsystem entry under `subsystems`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubsystemInfo {
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub description: String,
    /// Loading priority; higher loads (and starts, and stops) first.
    #[serde(default)]
    pub priority: i32,
    /// Config file path handed to the subsystem's `create`.
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub allow_version: String,
    /// CPU cores the subsystem prefers.
    #[serde(default)]
    pub affinity: Vec<usize>,
    /// `never`, `on_failure`, or `always`.
    #[serde(default)]
    pub restart_policy: String,
    #[serde(default)]
    pub restart_delay_ms: u64,
    #[serde(default)]
    pub max_retries: u32,
    /// Load failures of optional subsystems are warnings, not aborts.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub denied_modes: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// The `system` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mode: String,
}

/// The whole manifest document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemManifest {
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub modes: Vec<String>,
    /// Key name matches the wire format.
    #[serde(default, rename = "restart_policys")]
    pub restart_policies: Vec<String>,
    #[serde(default)]
    pub system: SystemInfo,
    #[serde(default)]
    pub hosts: BTreeMap<String, HostInfo>,
    #[serde(default)]
    pub subsystems: Vec<SubsystemInfo>,
}

impl SystemManifest {
    /// Parses a manifest document and applies the priority ordering.
    pub fn parse(yaml: &str, origin: &str) -> Result<Self, ManifestError> {
        let mut manifest: SystemManifest =
            serde_yaml::from_str(yaml).map_err(|source| ManifestError::Parse {
                path: origin.to_string(),
                source,
            })?;
        manifest.sort_subsystems();
        Ok(manifest)
    }

    /// Reads and parses a manifest file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: origin.clone(),
            source,
        })?;
        Self::parse(&text, &origin)
    }

    /// Finds a subsystem entry by name.
    pub fn subsystem(&self, name: &str) -> Option<&SubsystemInfo> {
        self.subsystems.iter().find(|s| s.name == name)
    }

    fn sort_subsystems(&mut self) {
        // stable: equal priorities keep manifest order
        self.subsystems.sort_by_key(|s| std::cmp::Reverse(s.priority));
    }
}
