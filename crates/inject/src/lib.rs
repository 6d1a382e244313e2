//! Runtime service registry.
//!
//! Services are registered under a [`ServiceType`] (a concrete type or a
//! `dyn Trait` capability) together with a [`Factory`] and a [`Lifecycle`],
//! and resolved on demand. Factory parameters are resolved recursively;
//! singletons are created once, on first successful resolution.
//!
//! ```rust,ignore
//! use inject::{provides, Factory, Lifecycle, Registry};
//!
//! let registry = Registry::new();
//! registry.register_singleton_interface::<dyn Logger, ConsoleLogger, _>(|_| Ok(ConsoleLogger))?;
//! registry.register_factory(
//!     Factory::inject(|(logger,): (Arc<dyn Logger>,)| Ok(UserService::new(logger))),
//!     Lifecycle::Transient,
//! )?;
//! let users = registry.resolve_as::<UserService>()?;
//! ```

mod builder;
mod config;
mod descriptor;
mod error;
mod factory;
mod graph;
mod lifecycle;
mod registry;
mod resolution;
mod service_type;
mod typed;

pub use builder::RegistryBuilder;
pub use config::{RegistryConfig, CONFIG_FILE_NAME, ENV_PREFIX};
pub use descriptor::ServiceInfo;
pub use error::{ConfigError, RegistryError};
pub use factory::{
    downcast_instance, Argument, Arguments, Dependencies, Dependency, Factory, Instance, Param,
    Provides, Relation,
};
pub use graph::{DependencyGraph, MissingDependency, ValidationReport};
pub use lifecycle::Lifecycle;
pub use registry::{Registry, RegistryStats};
pub use service_type::{ServiceKind, ServiceType};
