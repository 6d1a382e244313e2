use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::trace;

use crate::error::RegistryError;
use crate::factory::{Factory, Instance, View};
use crate::lifecycle::Lifecycle;
use crate::service_type::ServiceType;

/// Registration record for one service type.
///
/// The singleton slot has its own lock, independent of the registry map, so
/// creating one singleton never blocks resolution of unrelated services.
/// Introspection reads the atomics only and never waits on the slot lock.
pub(crate) struct Descriptor {
    pub(crate) service: ServiceType,
    pub(crate) factory: Factory,
    view: View,
    pub(crate) lifecycle: Lifecycle,
    instance: RwLock<Option<Instance>>,
    cached: AtomicBool,
    creations: AtomicU64,
}

impl Descriptor {
    pub(crate) fn new(service: ServiceType, factory: Factory, view: View, lifecycle: Lifecycle) -> Self {
        Self {
            service,
            factory,
            view,
            lifecycle,
            instance: RwLock::new(None),
            cached: AtomicBool::new(false),
            creations: AtomicU64::new(0),
        }
    }

    /// Return the instance for this descriptor, running `create` when the
    /// lifecycle requires a new one.
    ///
    /// Singletons use double-checked locking: the fast path only takes the
    /// read lock; creation happens under the write lock so concurrent first
    /// resolutions run the factory once. A failed creation caches nothing.
    pub(crate) fn get_or_create<F>(&self, create: F) -> Result<Instance, RegistryError>
    where
        F: FnOnce(&Factory) -> Result<Instance, RegistryError>,
    {
        match self.lifecycle {
            Lifecycle::Transient => self.create(create),
            Lifecycle::Singleton => {
                if let Some(instance) = self.instance.read().as_ref() {
                    return Ok(instance.clone());
                }

                let mut slot = self.instance.write();
                if let Some(instance) = slot.as_ref() {
                    trace!(service = %self.service, "singleton created by another thread");
                    return Ok(instance.clone());
                }

                let instance = self.create(create)?;
                *slot = Some(instance.clone());
                self.cached.store(true, Ordering::Release);
                Ok(instance)
            }
        }
    }

    fn create<F>(&self, create: F) -> Result<Instance, RegistryError>
    where
        F: FnOnce(&Factory) -> Result<Instance, RegistryError>,
    {
        let produced = create(&self.factory)?;
        let instance = self.view.apply(&produced).ok_or(RegistryError::Downcast {
            service: self.service.name(),
            expected: self.factory.produces().name(),
        })?;
        self.creations.fetch_add(1, Ordering::Relaxed);
        Ok(instance)
    }

    pub(crate) fn is_instantiated(&self) -> bool {
        self.cached.load(Ordering::Acquire)
    }

    pub(crate) fn creations(&self) -> u64 {
        self.creations.load(Ordering::Relaxed)
    }

    pub(crate) fn info(&self) -> ServiceInfo {
        ServiceInfo {
            service: self.service.name().to_string(),
            produces: self.factory.produces().name().to_string(),
            lifecycle: self.lifecycle,
            dependencies: self
                .factory
                .dependencies()
                .map(|dependency| dependency.name().to_string())
                .collect(),
            instantiated: self.is_instantiated(),
            creations: self.creations(),
        }
    }
}

/// Snapshot of one registration, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub produces: String,
    pub lifecycle: Lifecycle,
    pub dependencies: Vec<String>,
    pub instantiated: bool,
    pub creations: u64,
}
