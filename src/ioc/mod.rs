//! # Service composition (IoC) container.
//!
//! A type-indexed registry mapping `(interface type, name)` to a component
//! whose factory realizes one of four lifetimes:
//!
//! | Discipline | Instance lifetime |
//! |------------|-------------------|
//! | Singleton      | created at registration, lives with the container |
//! | SingletonLazy  | created on first resolve, lives with the container |
//! | Scoped         | one instance per [`Scope`] id, dropped when the scope expires |
//! | Transient      | fresh instance per resolve |
//!
//! Interfaces are any `?Sized + 'static` type — typically a trait object —
//! identified by [`std::any::TypeId`]. Resolution returns `Option<Arc<I>>`;
//! an unregistered key is `None`, never a panic.
//!
//! Two process-wide containers exist: [`services`] for service interfaces
//! and [`device_access`] for device accessors.
//!
//! ## Rules
//! - `(interface, name)` is unique; duplicates are ignored with a warning
//!   and the first registration stays authoritative.
//! - Scope id `0` is reserved for "no scope": `Scoped` resolution without a
//!   scope yields a fresh transient instance, and expiring id `0` is a no-op.
//! - A [`Scope`] borrows its container, so a token cannot outlive it.

mod component;
mod container;
mod factory;
mod scope;

pub use component::Component;
pub use container::{device_access, services, type_key, Container};
pub use factory::FactoryKind;
pub use scope::{Scope, ScopeId};
