//! Strongly-typed call sites over the `ServiceType`-keyed engine.

use std::any::type_name;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::factory::{downcast_instance, Factory, Provides};
use crate::lifecycle::Lifecycle;
use crate::registry::Registry;
use crate::service_type::ServiceType;

impl Registry {
    /// Resolve `T` and downcast it
    pub fn resolve_as<T>(&self) -> Result<Arc<T>, RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let instance = self.resolve(&ServiceType::of::<T>())?;
        downcast_instance::<T>(&instance)
    }

    /// Resolve `T`, panicking with the resolution error on failure.
    ///
    /// For wiring code where a missing service is a programming error.
    pub fn must_resolve<T>(&self) -> Arc<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.resolve_as::<T>() {
            Ok(instance) => instance,
            Err(err) => panic!("failed to resolve {}: {}", type_name::<T>(), err),
        }
    }

    /// Resolve `T`, discarding the error
    pub fn try_resolve<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_as::<T>().ok()
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.has(&ServiceType::of::<T>())
    }

    /// Register a factory under its own result type
    pub fn register_factory(
        &self,
        factory: Factory,
        lifecycle: Lifecycle,
    ) -> Result<(), RegistryError> {
        self.register(factory.produces(), factory, lifecycle)
    }

    /// Register concrete `T` built by `f`
    pub fn register_type<T, F>(&self, f: F, lifecycle: Lifecycle) -> Result<(), RegistryError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(ServiceType::of::<T>(), Factory::new(f), lifecycle)
    }

    pub fn register_singleton_type<T, F>(&self, f: F) -> Result<(), RegistryError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register_type(f, Lifecycle::Singleton)
    }

    pub fn register_transient_type<T, F>(&self, f: F) -> Result<(), RegistryError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register_type(f, Lifecycle::Transient)
    }

    /// Register `Impl` as the implementation of capability `I`.
    ///
    /// ```rust,ignore
    /// provides!(ConsoleLogger => dyn Logger);
    /// registry.register_interface::<dyn Logger, ConsoleLogger, _>(
    ///     |_| Ok(ConsoleLogger::new()),
    ///     Lifecycle::Singleton,
    /// )?;
    /// ```
    pub fn register_interface<I, Impl, F>(
        &self,
        f: F,
        lifecycle: Lifecycle,
    ) -> Result<(), RegistryError>
    where
        I: ?Sized + Send + Sync + 'static,
        Impl: Provides<I>,
        F: Fn(&Registry) -> anyhow::Result<Impl> + Send + Sync + 'static,
    {
        let factory = Factory::new(f).with_capability::<Impl, I>();
        self.register(ServiceType::of::<I>(), factory, lifecycle)
    }

    pub fn register_singleton_interface<I, Impl, F>(&self, f: F) -> Result<(), RegistryError>
    where
        I: ?Sized + Send + Sync + 'static,
        Impl: Provides<I>,
        F: Fn(&Registry) -> anyhow::Result<Impl> + Send + Sync + 'static,
    {
        self.register_interface::<I, Impl, F>(f, Lifecycle::Singleton)
    }

    pub fn register_transient_interface<I, Impl, F>(&self, f: F) -> Result<(), RegistryError>
    where
        I: ?Sized + Send + Sync + 'static,
        Impl: Provides<I>,
        F: Fn(&Registry) -> anyhow::Result<Impl> + Send + Sync + 'static,
    {
        self.register_interface::<I, Impl, F>(f, Lifecycle::Transient)
    }

    /// Register an already-built value as a singleton
    pub fn register_value<T>(&self, value: T) -> Result<(), RegistryError>
    where
        T: Send + Sync + 'static,
    {
        self.register_instance(Arc::new(value))
    }

    /// Register a shared instance as a singleton; `T` may be a trait object
    pub fn register_instance<T>(&self, instance: Arc<T>) -> Result<(), RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(
            ServiceType::of::<T>(),
            Factory::from_arc(instance),
            Lifecycle::Singleton,
        )
    }
}
