//! Service registry: the `ServiceType -> Descriptor` map and the register /
//! resolve operations over it.
//!
//! Locking has two levels. The map sits behind one `RwLock`: lookups
//! (`resolve`, `has`, `list_types`) share it, while `register` and `clear` take
//! it exclusively. Each singleton descriptor has its own lock for the creation
//! race. The map lock is released before any factory runs, so a long-running
//! factory never blocks registration and nested resolutions never hold the
//! map lock recursively.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::RegistryConfig;
use crate::descriptor::{Descriptor, ServiceInfo};
use crate::error::RegistryError;
use crate::factory::{Argument, Arguments, Factory, Instance, Param};
use crate::lifecycle::Lifecycle;
use crate::resolution::ResolutionGuard;
use crate::service_type::ServiceType;

struct RegistryInner {
    services: RwLock<HashMap<ServiceType, Arc<Descriptor>>>,
    config: RegistryConfig,
}

/// Runtime service registry.
///
/// Cloning is cheap and yields a handle to the same registry; factories
/// receive such a handle as their back-reference parameter.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

/// Aggregate counters over the current registrations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub registered: usize,
    pub singletons: usize,
    pub transients: usize,
    pub cached_singletons: usize,
    pub total_creations: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        debug!(
            max_resolution_depth = config.max_resolution_depth,
            verbose_logging = config.verbose_logging,
            "creating registry"
        );
        Self {
            inner: Arc::new(RegistryInner {
                services: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Register `factory` under `service`.
    ///
    /// The factory's result type must match `service` (or be an `Arc` of it,
    /// or the reverse), or provide it when `service` is a capability. A
    /// rejected registration leaves any existing entry untouched; an accepted
    /// one replaces it. The factory is not invoked.
    pub fn register(
        &self,
        service: ServiceType,
        factory: Factory,
        lifecycle: Lifecycle,
    ) -> Result<(), RegistryError> {
        if !factory.defects().is_empty() {
            return Err(RegistryError::malformed(
                service.name(),
                factory.defects().join("; "),
            ));
        }
        if factory.dependencies().any(|dependency| dependency == service) {
            return Err(RegistryError::malformed(
                service.name(),
                "factory declares its own service type as a parameter",
            ));
        }

        let view = factory
            .view_for(&service)
            .cloned()
            .ok_or_else(|| RegistryError::TypeMismatch {
                produced: factory.produces().name(),
                service: service.name(),
                relation: if service.is_capability() {
                    "implement interface"
                } else {
                    "match service type"
                },
            })?;
        let relation = view.relation;

        let descriptor = Arc::new(Descriptor::new(service, factory, view, lifecycle));
        let previous = self.inner.services.write().insert(service, descriptor);

        if previous.is_some() {
            debug!(service = %service, %lifecycle, ?relation, "replaced existing registration");
        } else {
            debug!(service = %service, %lifecycle, ?relation, "registered service");
        }
        Ok(())
    }

    pub fn register_singleton(
        &self,
        service: ServiceType,
        factory: Factory,
    ) -> Result<(), RegistryError> {
        self.register(service, factory, Lifecycle::Singleton)
    }

    pub fn register_transient(
        &self,
        service: ServiceType,
        factory: Factory,
    ) -> Result<(), RegistryError> {
        self.register(service, factory, Lifecycle::Transient)
    }

    /// Resolve an instance of `service`.
    ///
    /// Singletons are created on first success and shared afterwards; a
    /// failed creation is not cached. Declared factory parameters are
    /// resolved first against this registry.
    pub fn resolve(&self, service: &ServiceType) -> Result<Instance, RegistryError> {
        let _guard = ResolutionGuard::enter(
            self.identity(),
            *service,
            self.inner.config.max_resolution_depth,
        )
        .map_err(|err| {
            warn!(service = %service, error = %err, "resolution aborted");
            err
        })?;

        let descriptor = self
            .inner
            .services
            .read()
            .get(service)
            .cloned()
            .ok_or_else(|| RegistryError::not_registered(service.name()))?;

        if self.inner.config.verbose_logging {
            debug!(service = %service, lifecycle = %descriptor.lifecycle, "resolving service");
        } else {
            trace!(service = %service, lifecycle = %descriptor.lifecycle, "resolving service");
        }

        descriptor.get_or_create(|factory| self.create_instance(factory))
    }

    fn create_instance(&self, factory: &Factory) -> Result<Instance, RegistryError> {
        let mut arguments = Vec::with_capacity(factory.params().len());
        for param in factory.params() {
            match param {
                Param::Registry => arguments.push(Argument::Registry(self.clone())),
                Param::Service(dependency) => {
                    let instance = self.resolve(dependency).map_err(|source| {
                        RegistryError::DependencyResolution {
                            dependency: dependency.name(),
                            source: Box::new(source),
                        }
                    })?;
                    arguments.push(Argument::Service(instance));
                }
            }
        }
        factory.invoke(Arguments::new(arguments))
    }

    /// Whether a descriptor is stored for `service`
    pub fn has(&self, service: &ServiceType) -> bool {
        self.inner.services.read().contains_key(service)
    }

    /// Snapshot of the registered service types
    pub fn list_types(&self) -> HashSet<ServiceType> {
        self.inner.services.read().keys().copied().collect()
    }

    /// Drop every registration.
    ///
    /// Instances already handed out stay valid; the registry only loses its
    /// references to them.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.inner.services.write());
        debug!(removed = removed.len(), "cleared registry");
    }

    pub fn len(&self) -> usize {
        self.inner.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.services.read().is_empty()
    }

    pub fn lifecycle_of(&self, service: &ServiceType) -> Option<Lifecycle> {
        self.inner
            .services
            .read()
            .get(service)
            .map(|descriptor| descriptor.lifecycle)
    }

    /// One [`ServiceInfo`] per registration, sorted by service name
    pub fn describe(&self) -> Vec<ServiceInfo> {
        let mut infos: Vec<ServiceInfo> = self
            .descriptors()
            .iter()
            .map(|descriptor| descriptor.info())
            .collect();
        infos.sort_by(|a, b| a.service.cmp(&b.service));
        infos
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for descriptor in self.descriptors() {
            stats.registered += 1;
            stats.total_creations += descriptor.creations();
            match descriptor.lifecycle {
                Lifecycle::Singleton => {
                    stats.singletons += 1;
                    if descriptor.is_instantiated() {
                        stats.cached_singletons += 1;
                    }
                }
                Lifecycle::Transient => stats.transients += 1,
            }
        }
        stats
    }

    /// Snapshot of the descriptors, taken without holding the map lock
    /// afterwards
    pub(crate) fn descriptors(&self) -> Vec<Arc<Descriptor>> {
        self.inner.services.read().values().cloned().collect()
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("services", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::downcast_instance;

    #[derive(Debug)]
    struct Counter(u32);

    #[test]
    fn test_register_does_not_invoke_factory() {
        let registry = Registry::new();
        registry
            .register(
                ServiceType::of::<Counter>(),
                Factory::new(|_| -> anyhow::Result<Counter> { panic!("factory invoked") }),
                Lifecycle::Singleton,
            )
            .unwrap();
        assert!(registry.has(&ServiceType::of::<Counter>()));
        assert_eq!(registry.stats().total_creations, 0);
    }

    #[test]
    fn test_resolve_returns_factory_value() {
        let registry = Registry::new();
        registry
            .register(
                ServiceType::of::<Counter>(),
                Factory::infallible(|_| Counter(7)),
                Lifecycle::Transient,
            )
            .unwrap();
        let instance = registry.resolve(&ServiceType::of::<Counter>()).unwrap();
        assert_eq!(downcast_instance::<Counter>(&instance).unwrap().0, 7);
    }

    #[test]
    fn test_self_dependency_is_malformed() {
        let registry = Registry::new();
        let err = registry
            .register(
                ServiceType::of::<Counter>(),
                Factory::inject(|(inner,): (Arc<Counter>,)| Ok(Counter(inner.0 + 1))),
                Lifecycle::Singleton,
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::MalformedFactory { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concrete_mismatch_message() {
        let registry = Registry::new();
        let err = registry
            .register(
                ServiceType::of::<Counter>(),
                Factory::infallible(|_| 5u8),
                Lifecycle::Singleton,
            )
            .unwrap_err();
        assert!(err.is_type_mismatch());
        assert!(err.to_string().contains("does not match service type"));
    }

    #[test]
    fn test_shared_result_registers_under_inner_type() {
        let registry = Registry::new();
        registry
            .register(
                ServiceType::of::<Counter>(),
                Factory::shared(|_| Ok(Arc::new(Counter(3)))),
                Lifecycle::Singleton,
            )
            .unwrap();
        let first = registry.resolve(&ServiceType::of::<Counter>()).unwrap();
        let second = registry.resolve(&ServiceType::of::<Counter>()).unwrap();
        let first = downcast_instance::<Counter>(&first).unwrap();
        let second = downcast_instance::<Counter>(&second).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.0, 3);
    }

    #[test]
    fn test_lifecycle_shorthands() {
        let registry = Registry::new();
        let service = ServiceType::of::<Counter>();
        registry
            .register_singleton(service, Factory::infallible(|_| Counter(1)))
            .unwrap();
        assert_eq!(registry.lifecycle_of(&service), Some(Lifecycle::Singleton));

        registry
            .register_transient(service, Factory::infallible(|_| Counter(2)))
            .unwrap();
        assert_eq!(registry.lifecycle_of(&service), Some(Lifecycle::Transient));
        let first = downcast_instance::<Counter>(&registry.resolve(&service).unwrap()).unwrap();
        let second = downcast_instance::<Counter>(&registry.resolve(&service).unwrap()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.0, 2);
    }

    #[test]
    fn test_stats_track_creations() {
        let registry = Registry::new();
        registry
            .register(
                ServiceType::of::<Counter>(),
                Factory::infallible(|_| Counter(1)),
                Lifecycle::Transient,
            )
            .unwrap();
        for _ in 0..3 {
            registry.resolve(&ServiceType::of::<Counter>()).unwrap();
        }
        let stats = registry.stats();
        assert_eq!(stats.registered, 1);
        assert_eq!(stats.transients, 1);
        assert_eq!(stats.total_creations, 3);
        assert_eq!(stats.cached_singletons, 0);
    }
}
