//! # subvisor
//!
//! **Subvisor** is a modular embedded service platform: a host that loads
//! subsystems from shared libraries, drives them through a lifecycle, and
//! gives each subsystem shared runtime services — task execution, service
//! composition, and command dispatch.
//!
//! | Area | Description | Key types |
//! |------|-------------|-----------|
//! | **Task units**  | One-shot execution primitives: sync, async, thread-backed, with affinity/priority control. | [`TaskUnit`], [`ThreadTask`], [`AsyncTask`], [`SyncTask`], [`TaskDescriptor`] |
//! | **Workers**     | Lifecycle wrapper over a thread task with Single/Loop/Event modes. | [`Worker`], [`Work`], [`WorkerDescriptor`] |
//! | **Pools**       | Priority-queued dispatchers over unit fleets with throttling and boost re-enqueue. | [`ThreadPool`], [`AsyncPool`] |
//! | **IoC**         | Type-indexed container with singleton/scoped/transient factories and scope-tied expiry. | [`Container`], [`Scope`] |
//! | **Composition** | ABI-versioned shared-library subsystems under controllers with lifecycle fan-out. | [`SubsystemManager`], [`SubsystemController`], [`Loader`] |
//! | **Commands**    | Mode-gated routing of named commands to registered services. | [`CommandDispatcher`], [`CommandRegistry`] |
//! | **Events**      | Broadcast bus for platform lifecycle events. | [`Bus`], [`Event`], [`Subscribe`] |
//! | **Errors**      | Closed result-code taxonomy shared with the subsystem ABI. | [`SystemError`], [`ResultCode`] |
//!
//! ## A subsystem's life
//!
//! ```text
//! manifest ──► SubsystemManager::load ──► dlopen / ABI check / create
//!                 │
//!                 ├─► registry / registryModule   (IoC population)
//!                 └─► init → selfTest → configure → ready → start
//!                         pause / stop / recovery / safe
//!                         systemMode(mode) broadcast
//! ```
//!
//! Runtime commands arrive from the message bus, pass the
//! [`CommandDispatcher`] mode gate, and land on a service method; services
//! resolve collaborators through the [`Container`] and offload work onto
//! [`ThreadPool`]/[`AsyncPool`] fleets.

pub mod command;
pub mod composition;
pub mod config;
pub mod error;
pub mod events;
pub mod ioc;
pub mod manifest;
pub mod modes;
pub mod pool;
pub mod tasks;
pub mod worker;

// ---- Public re-exports ----

pub use command::{
    ArgType, ArgValue, CommandDispatcher, CommandInfo, CommandManifestLoader, CommandRegistry,
    CommandTable, Message, SystemService,
};
pub use composition::{
    LoadedSubsystem, Loader, RestartPolicy, RestartSpec, SubsystemController, SubsystemManager,
};
pub use config::SystemConfig;
pub use error::{ManifestError, ResultCode, SysResult, SystemError};
pub use events::{Bus, Event, EventKind, Subscribe};
pub use ioc::{Container, FactoryKind, Scope, ScopeId};
pub use manifest::{SubsystemInfo, SystemManifest};
pub use modes::SystemMode;
pub use pool::{AsyncPool, AsyncPoolDescriptor, PoolStatsSnapshot, ThreadPool, ThreadPoolDescriptor};
pub use tasks::{
    AsyncTask, DispatchPolicy, ExecutionMode, SyncTask, TaskBuilder, TaskDescriptor, TaskUnit,
    ThreadTask,
};
pub use worker::{Work, Worker, WorkerContext, WorkerDescriptor, WorkerState, WorkerType};
