use std::sync::Arc;

use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::factory::{Factory, Provides};
use crate::lifecycle::Lifecycle;
use crate::registry::Registry;
use crate::service_type::ServiceType;

struct Registration {
    service: ServiceType,
    factory: Factory,
    lifecycle: Lifecycle,
}

/// Collects registrations and builds a [`Registry`] in one step.
///
/// Registration errors surface from [`build`](Self::build), in the order the
/// registrations were added. With `validate_on_build` the declared dependency
/// graph is checked as well.
pub struct RegistryBuilder {
    config: RegistryConfig,
    registrations: Vec<Registration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
            registrations: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register(mut self, service: ServiceType, factory: Factory, lifecycle: Lifecycle) -> Self {
        self.registrations.push(Registration {
            service,
            factory,
            lifecycle,
        });
        self
    }

    /// Register a factory under its own result type
    pub fn factory(self, factory: Factory, lifecycle: Lifecycle) -> Self {
        let service = factory.produces();
        self.register(service, factory, lifecycle)
    }

    pub fn singleton<T, F>(self, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(ServiceType::of::<T>(), Factory::new(f), Lifecycle::Singleton)
    }

    pub fn transient<T, F>(self, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(ServiceType::of::<T>(), Factory::new(f), Lifecycle::Transient)
    }

    pub fn interface<I, Impl, F>(self, f: F, lifecycle: Lifecycle) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        Impl: Provides<I>,
        F: Fn(&Registry) -> anyhow::Result<Impl> + Send + Sync + 'static,
    {
        let factory = Factory::new(f).with_capability::<Impl, I>();
        self.register(ServiceType::of::<I>(), factory, lifecycle)
    }

    pub fn value<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.instance(Arc::new(value))
    }

    pub fn instance<T: ?Sized + Send + Sync + 'static>(self, instance: Arc<T>) -> Self {
        self.register(
            ServiceType::of::<T>(),
            Factory::from_arc(instance),
            Lifecycle::Singleton,
        )
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        let validate = self.config.validate_on_build;
        let registry = Registry::with_config(self.config);
        for registration in self.registrations {
            registry.register(
                registration.service,
                registration.factory,
                registration.lifecycle,
            )?;
        }

        if validate {
            registry.validate().into_result()?;
        }
        debug!(services = registry.len(), validated = validate, "registry built");
        Ok(registry)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
