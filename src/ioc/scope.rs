//! # Scope lifetime token.
//!
//! A [`Scope`] gates the lifetime of scoped instances: resolving through a
//! scope keys the factory map by the scope's id, and dropping the scope
//! expires every instance under that id. The token is affine — neither
//! `Clone` nor `Copy` — and borrows its container, so it cannot outlive it.
//!
//! Ids come from a monotonic counter starting at 1; `0` is reserved for
//! "no scope".

use std::sync::atomic::{AtomicU64, Ordering};

use super::container::Container;

/// Identity of a scope; `0` means "no scope".
pub type ScopeId = u64;

static SCOPE_IDS: AtomicU64 = AtomicU64::new(1);

/// Affine lifetime token tied to one container.
///
/// The intended pattern is a stack-local scope inside a dispatch:
///
/// ```ignore
/// let scope = container.scope();
/// let svc = container.resolve_scoped::<dyn SomeService>("sampler", &scope)?;
/// // ... scope drops on every exit path, expiring the scoped instances
/// ```
pub struct Scope<'c> {
    id: ScopeId,
    container: &'c Container,
}

impl<'c> Scope<'c> {
    pub(crate) fn new(container: &'c Container) -> Self {
        Self {
            id: SCOPE_IDS.fetch_add(1, Ordering::Relaxed),
            container,
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.container.expire(self.id);
    }
}
