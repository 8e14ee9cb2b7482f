//! # Subsystem composition.
//!
//! Dynamic loading of ABI-versioned shared-library subsystems and the
//! machinery that drives them:
//!
//! ```text
//! manifest ──► SubsystemManager::load
//!                 │  per entry: lib<name>.so → dlopen → descriptor →
//!                 │  ABI check → create → SubsystemController
//!                 ▼
//!           lifecycle fan-outs (priority order, no short-circuit)
//!           init → selfTest → configure → ready → start
//!           pause / stop / recovery / safe / systemMode(mode)
//! ```
//!
//! The raw ABI lives in [`abi`]; [`loader`] owns `dlopen`/`dlclose`;
//! [`controller`] is the safe façade; [`manager`] fans out; [`restart`]
//! executes the manifest restart policy on start failures.

pub mod abi;
mod controller;
mod loader;
mod manager;
mod restart;

#[cfg(test)]
pub(crate) mod testkit;

pub use controller::SubsystemController;
pub use loader::{LoadedSubsystem, Loader};
pub use manager::SubsystemManager;
pub use restart::{RestartPolicy, RestartSpec};
