//! # Type-indexed component container.
//!
//! Maps `interface TypeId → (name → Component)` behind one collection lock.
//! Registration never replaces: a duplicate `(interface, name)` is ignored
//! with a warning and the first entry stays authoritative. Resolution looks
//! the component up under the lock, then invokes the factory outside it so
//! factories may resolve their own collaborators.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::component::Component;
use super::factory::{
    AnyHandle, Maker, ScopedFactory, SingletonFactory, SingletonLazyFactory, TransientFactory,
};
use super::scope::{Scope, ScopeId};

/// Default registration name for an interface type.
///
/// The container's stable identity is the `TypeId`; the type name is only a
/// readable default key, mirroring registration-by-type.
pub fn type_key<I: ?Sized + 'static>() -> &'static str {
    type_name::<I>()
}

/// Type-indexed, scope-lifetime-aware component registry.
pub struct Container {
    components: Mutex<HashMap<TypeId, HashMap<String, Component>>>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self {
            components: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a ready-made instance as a singleton.
    ///
    /// Returns `false` when `(interface, name)` was already registered.
    pub fn register_singleton<I>(&self, name: impl Into<String>, instance: Arc<I>) -> bool
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let handle: AnyHandle = Arc::new(instance);
        self.add::<I>(
            name.into(),
            Arc::new(SingletonFactory::new(handle)),
        )
    }

    /// Registers a singleton constructed on first resolve.
    pub fn register_singleton_lazy<I>(
        &self,
        name: impl Into<String>,
        make: impl Fn() -> Arc<I> + Send + Sync + 'static,
    ) -> bool
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.add::<I>(
            name.into(),
            Arc::new(SingletonLazyFactory::new(erase(make))),
        )
    }

    /// Registers a scoped component: one instance per scope id.
    pub fn register_scoped<I>(
        &self,
        name: impl Into<String>,
        make: impl Fn() -> Arc<I> + Send + Sync + 'static,
    ) -> bool
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.add::<I>(name.into(), Arc::new(ScopedFactory::new(erase(make))))
    }

    /// Registers a transient component: fresh instance per resolve.
    pub fn register_transient<I>(
        &self,
        name: impl Into<String>,
        make: impl Fn() -> Arc<I> + Send + Sync + 'static,
    ) -> bool
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.add::<I>(name.into(), Arc::new(TransientFactory::new(erase(make))))
    }

    /// Resolves `(I, name)` without a scope (scope id 0).
    pub fn resolve<I>(&self, name: &str) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with::<I>(name, 0)
    }

    /// Resolves `(I, name)` under a scope; scoped components return the
    /// scope's instance, other disciplines ignore the scope.
    pub fn resolve_scoped<I>(&self, name: &str, scope: &Scope<'_>) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with::<I>(name, scope.id())
    }

    /// Removes a registration. The factory and any retained instances drop
    /// with it.
    pub fn deregister<I>(&self, name: &str) -> bool
    where
        I: ?Sized + 'static,
    {
        let mut map = self.components.lock();
        match map.get_mut(&TypeId::of::<I>()) {
            Some(by_name) => by_name.remove(name).is_some(),
            None => false,
        }
    }

    /// Whether `(I, name)` is registered.
    pub fn is_registered<I>(&self, name: &str) -> bool
    where
        I: ?Sized + 'static,
    {
        self.components
            .lock()
            .get(&TypeId::of::<I>())
            .is_some_and(|by_name| by_name.contains_key(name))
    }

    /// Creates a new scope token tied to this container.
    pub fn scope(&self) -> Scope<'_> {
        Scope::new(self)
    }

    /// Expires every factory-retained instance under `id`. Id `0` is a
    /// no-op by contract.
    pub fn expire(&self, id: ScopeId) {
        if id == 0 {
            return;
        }
        debug!(scope = id, "expiring scoped instances");
        let map = self.components.lock();
        for by_name in map.values() {
            for component in by_name.values() {
                component.destroy_instance(id);
            }
        }
    }

    fn add<I>(&self, name: String, factory: Arc<dyn super::factory::Factory>) -> bool
    where
        I: ?Sized + 'static,
    {
        let component = Component::new(TypeId::of::<I>(), type_name::<I>(), name, factory);
        let mut map = self.components.lock();
        let by_name = map.entry(component.interface()).or_default();
        if by_name.contains_key(component.name()) {
            warn!(
                interface = component.interface_name(),
                name = component.name(),
                "duplicate registration ignored"
            );
            return false;
        }
        by_name.insert(component.name().to_string(), component);
        true
    }

    fn resolve_with<I>(&self, name: &str, key: ScopeId) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let factory = {
            let map = self.components.lock();
            map.get(&TypeId::of::<I>())?.get(name)?.factory()
        };
        // the factory runs outside the collection lock so its maker may
        // resolve collaborators from this same container
        let handle = factory.create(key);
        handle.downcast_ref::<Arc<I>>().cloned()
    }
}

fn erase<I>(make: impl Fn() -> Arc<I> + Send + Sync + 'static) -> Maker
where
    I: ?Sized + Send + Sync + 'static,
{
    Arc::new(move || {
        let instance: Arc<I> = make();
        Arc::new(instance) as AnyHandle
    })
}

static SERVICES: OnceLock<Container> = OnceLock::new();
static DEVICE_ACCESS: OnceLock<Container> = OnceLock::new();

/// Process-wide container for service interfaces.
pub fn services() -> &'static Container {
    SERVICES.get_or_init(Container::new)
}

/// Process-wide container for device accessors.
pub fn device_access() -> &'static Container {
    DEVICE_ACCESS.get_or_init(Container::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    struct Spanish;

    impl Greeter for Spanish {
        fn greet(&self) -> String {
            "hola".into()
        }
    }

    #[test]
    fn singleton_resolves_to_the_same_instance() {
        let c = Container::new();
        assert!(c.register_singleton::<dyn Greeter>("greeter", Arc::new(English)));
        let a = c.resolve::<dyn Greeter>("greeter").unwrap();
        let b = c.resolve::<dyn Greeter>("greeter").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.greet(), "hello");
    }

    #[test]
    fn transient_resolves_fresh_instances() {
        let c = Container::new();
        c.register_transient::<dyn Greeter>("greeter", || Arc::new(English));
        let a = c.resolve::<dyn Greeter>("greeter").unwrap();
        let b = c.resolve::<dyn Greeter>("greeter").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn lazy_singleton_constructs_on_first_resolve() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static BUILDS: AtomicUsize = AtomicUsize::new(0);

        let c = Container::new();
        c.register_singleton_lazy::<dyn Greeter>("greeter", || {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Arc::new(English)
        });
        assert_eq!(BUILDS.load(Ordering::SeqCst), 0);
        let a = c.resolve::<dyn Greeter>("greeter").unwrap();
        let b = c.resolve::<dyn Greeter>("greeter").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scoped_lifetime_follows_the_scope() {
        // S4: same instance within a scope; a fresh one after expiry
        let c = Container::new();
        c.register_scoped::<dyn Greeter>("greeter", || Arc::new(English));

        let first = {
            let s1 = c.scope();
            let a = c.resolve_scoped::<dyn Greeter>("greeter", &s1).unwrap();
            let b = c.resolve_scoped::<dyn Greeter>("greeter", &s1).unwrap();
            assert!(Arc::ptr_eq(&a, &b));
            a
        };

        let s2 = c.scope();
        let c2 = c.resolve_scoped::<dyn Greeter>("greeter", &s2).unwrap();
        assert!(!Arc::ptr_eq(&first, &c2));
    }

    #[test]
    fn scoped_without_scope_is_transient() {
        let c = Container::new();
        c.register_scoped::<dyn Greeter>("greeter", || Arc::new(English));
        let a = c.resolve::<dyn Greeter>("greeter").unwrap();
        let b = c.resolve::<dyn Greeter>("greeter").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn duplicate_registration_keeps_the_first() {
        let c = Container::new();
        assert!(c.register_singleton::<dyn Greeter>("greeter", Arc::new(English)));
        assert!(!c.register_singleton::<dyn Greeter>("greeter", Arc::new(Spanish)));
        let g = c.resolve::<dyn Greeter>("greeter").unwrap();
        assert_eq!(g.greet(), "hello");
    }

    #[test]
    fn names_partition_the_interface_namespace() {
        let c = Container::new();
        c.register_singleton::<dyn Greeter>("en", Arc::new(English));
        c.register_singleton::<dyn Greeter>("es", Arc::new(Spanish));
        assert_eq!(c.resolve::<dyn Greeter>("en").unwrap().greet(), "hello");
        assert_eq!(c.resolve::<dyn Greeter>("es").unwrap().greet(), "hola");
        assert!(c.resolve::<dyn Greeter>("fr").is_none());
    }

    #[test]
    fn deregister_removes_the_component() {
        let c = Container::new();
        c.register_singleton::<dyn Greeter>("greeter", Arc::new(English));
        assert!(c.deregister::<dyn Greeter>("greeter"));
        assert!(!c.deregister::<dyn Greeter>("greeter"));
        assert!(c.resolve::<dyn Greeter>("greeter").is_none());
    }

    #[test]
    fn concrete_types_work_as_interfaces() {
        let c = Container::new();
        c.register_singleton::<u64>(type_key::<u64>(), Arc::new(41u64));
        let value = c.resolve::<u64>(type_key::<u64>()).unwrap();
        assert_eq!(*value, 41);
    }

    #[test]
    fn expire_zero_is_a_noop() {
        let c = Container::new();
        c.register_scoped::<dyn Greeter>("greeter", || Arc::new(English));
        c.expire(0);
    }
}
