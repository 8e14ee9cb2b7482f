//! Registry entry binding one `(interface, name)` key to its factory.

use std::any::TypeId;
use std::sync::Arc;

use super::factory::{AnyHandle, Factory, FactoryKind};
use super::scope::ScopeId;

/// One registered component.
pub struct Component {
    interface: TypeId,
    interface_name: &'static str,
    name: String,
    factory: Arc<dyn Factory>,
}

impl Component {
    pub(crate) fn new(
        interface: TypeId,
        interface_name: &'static str,
        name: String,
        factory: Arc<dyn Factory>,
    ) -> Self {
        Self {
            interface,
            interface_name,
            name,
            factory,
        }
    }

    /// Registration name within the interface's namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable interface type name (diagnostics only; the stable
    /// identity is the `TypeId`).
    pub fn interface_name(&self) -> &'static str {
        self.interface_name
    }

    pub fn kind(&self) -> FactoryKind {
        self.factory.kind()
    }

    pub(crate) fn interface(&self) -> TypeId {
        self.interface
    }

    pub(crate) fn factory(&self) -> Arc<dyn Factory> {
        Arc::clone(&self.factory)
    }

    pub(crate) fn create_service(&self, key: ScopeId) -> AnyHandle {
        self.factory.create(key)
    }

    /// Drops the factory-retained instance for `key`.
    pub(crate) fn destroy_instance(&self, key: ScopeId) {
        self.factory.destroy_instance(key);
    }
}
