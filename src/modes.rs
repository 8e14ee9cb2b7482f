//! # System operating modes.
//!
//! A mode is a coarse regime that gates which commands and subsystems are
//! permitted. Modes cross the subsystem ABI as a `u32`
//! ([`SystemMode::as_abi`]); inside the host they also have stable string
//! names used by manifests and the command mode gate.

/// Coarse system operating regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SystemMode {
    Normal = 0,
    Production = 1,
    Update = 2,
    Calibration = 3,
    Maintenance = 4,
}

impl SystemMode {
    /// Raw value used on the subsystem ABI (`system_mode(handle, mode)`).
    pub const fn as_abi(self) -> u32 {
        self as u32
    }

    /// Stable lowercase name as used in manifests.
    pub const fn name(self) -> &'static str {
        match self {
            SystemMode::Normal => "normal",
            SystemMode::Production => "production",
            SystemMode::Update => "update",
            SystemMode::Calibration => "calibration",
            SystemMode::Maintenance => "maintenance",
        }
    }

    /// Parses a manifest mode name. Unknown names yield `None`; manifests
    /// may declare additional command-gating modes (e.g. `low_power`) that
    /// have no ABI value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "normal" => Some(SystemMode::Normal),
            "production" => Some(SystemMode::Production),
            "update" => Some(SystemMode::Update),
            "calibration" => Some(SystemMode::Calibration),
            "maintenance" => Some(SystemMode::Maintenance),
            _ => None,
        }
    }
}

impl std::fmt::Display for SystemMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
