//! # Factory disciplines.
//!
//! A factory owns whatever its discipline retains: the live instance
//! (Singleton), a lazily-filled cell (SingletonLazy), a `scope id →
//! instance` map (Scoped), or nothing (Transient). Instances are stored
//! type-erased as `Arc<dyn Any>` wrapping the typed `Arc<I>` handle; the
//! container restores the type at resolution.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::scope::ScopeId;

/// Type-erased instance handle; the payload is an `Arc<I>`.
pub(crate) type AnyHandle = Arc<dyn Any + Send + Sync>;

/// Type-erased instance constructor.
pub(crate) type Maker = Arc<dyn Fn() -> AnyHandle + Send + Sync>;

/// Registration discipline of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    Singleton,
    SingletonLazy,
    Scoped,
    Transient,
}

pub(crate) trait Factory: Send + Sync {
    fn kind(&self) -> FactoryKind;

    /// Produces (or returns) the instance for `key`.
    fn create(&self, key: ScopeId) -> AnyHandle;

    /// Drops the instance retained for `key`. Key `0` is a no-op by
    /// contract; disciplines that retain nothing per key ignore the call.
    fn destroy_instance(&self, key: ScopeId);
}

/// Holds the instance created at registration.
pub(crate) struct SingletonFactory {
    instance: AnyHandle,
}

impl SingletonFactory {
    pub(crate) fn new(instance: AnyHandle) -> Self {
        Self { instance }
    }
}

impl Factory for SingletonFactory {
    fn kind(&self) -> FactoryKind {
        FactoryKind::Singleton
    }

    fn create(&self, _key: ScopeId) -> AnyHandle {
        Arc::clone(&self.instance)
    }

    fn destroy_instance(&self, _key: ScopeId) {}
}

/// Constructs the instance on first resolve, then behaves like a singleton.
pub(crate) struct SingletonLazyFactory {
    maker: Maker,
    cell: Mutex<Option<AnyHandle>>,
}

impl SingletonLazyFactory {
    pub(crate) fn new(maker: Maker) -> Self {
        Self {
            maker,
            cell: Mutex::new(None),
        }
    }
}

impl Factory for SingletonLazyFactory {
    fn kind(&self) -> FactoryKind {
        FactoryKind::SingletonLazy
    }

    fn create(&self, _key: ScopeId) -> AnyHandle {
        let mut cell = self.cell.lock();
        Arc::clone(cell.get_or_insert_with(|| (self.maker)()))
    }

    fn destroy_instance(&self, _key: ScopeId) {}
}

/// One instance per scope id; key `0` escapes to transient behavior.
pub(crate) struct ScopedFactory {
    maker: Maker,
    instances: DashMap<ScopeId, AnyHandle>,
}

impl ScopedFactory {
    pub(crate) fn new(maker: Maker) -> Self {
        Self {
            maker,
            instances: DashMap::new(),
        }
    }
}

impl Factory for ScopedFactory {
    fn kind(&self) -> FactoryKind {
        FactoryKind::Scoped
    }

    fn create(&self, key: ScopeId) -> AnyHandle {
        if key == 0 {
            return (self.maker)();
        }
        Arc::clone(
            self.instances
                .entry(key)
                .or_insert_with(|| (self.maker)())
                .value(),
        )
    }

    fn destroy_instance(&self, key: ScopeId) {
        if key == 0 {
            return;
        }
        self.instances.remove(&key);
    }
}

/// Retains nothing; every resolve constructs.
pub(crate) struct TransientFactory {
    maker: Maker,
}

impl TransientFactory {
    pub(crate) fn new(maker: Maker) -> Self {
        Self { maker }
    }
}

impl Factory for TransientFactory {
    fn kind(&self) -> FactoryKind {
        FactoryKind::Transient
    }

    fn create(&self, _key: ScopeId) -> AnyHandle {
        (self.maker)()
    }

    fn destroy_instance(&self, _key: ScopeId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maker() -> Maker {
        Arc::new(|| {
            let value: Arc<u32> = Arc::new(7);
            Arc::new(value) as AnyHandle
        })
    }

    #[test]
    fn scoped_zero_key_is_transient() {
        let factory = ScopedFactory::new(maker());
        let a = factory.create(0);
        let b = factory.create(0);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn scoped_nonzero_key_is_sticky() {
        let factory = ScopedFactory::new(maker());
        let a = factory.create(5);
        let b = factory.create(5);
        assert!(Arc::ptr_eq(&a, &b));

        factory.destroy_instance(5);
        let c = factory.create(5);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn destroy_on_missing_key_is_noop() {
        let factory = ScopedFactory::new(maker());
        factory.destroy_instance(42);
        factory.destroy_instance(0);
    }

    #[test]
    fn lazy_constructs_once() {
        let factory = SingletonLazyFactory::new(maker());
        let a = factory.create(0);
        let b = factory.create(1);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
