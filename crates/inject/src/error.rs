//! Error types for registration, resolution and configuration.
//!
//! Every failure is returned to the immediate caller. The registry never logs
//! an error instead of returning it, never swallows one and never retries.

use thiserror::Error;

/// Errors raised by [`Registry`](crate::Registry) operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The factory can never produce the service it was registered for
    #[error("malformed factory for {service}: {reason}")]
    MalformedFactory {
        service: &'static str,
        reason: String,
    },

    /// Factory result type is incompatible with the declared service type
    #[error("factory return type {produced} does not {relation} {service}")]
    TypeMismatch {
        produced: &'static str,
        service: &'static str,
        /// "implement interface" or "match service type"
        relation: &'static str,
    },

    /// No descriptor stored for the requested type
    #[error("service of type {service} not registered")]
    NotRegistered { service: &'static str },

    /// A declared factory parameter could not be resolved
    #[error("failed to resolve dependency {dependency}: {source}")]
    DependencyResolution {
        dependency: &'static str,
        #[source]
        source: Box<RegistryError>,
    },

    /// The service is already being resolved further up the same call chain
    #[error("circular dependency detected while resolving {service}: {path}")]
    CircularDependency { service: &'static str, path: String },

    /// Resolution chain grew past `RegistryConfig::max_resolution_depth`
    #[error("resolution depth {depth} exceeds limit {limit} while resolving {service}")]
    DepthExceeded {
        service: &'static str,
        depth: usize,
        limit: usize,
    },

    /// A stored instance did not hold the type it was registered for
    #[error("resolved instance for {service} has unexpected type {expected}")]
    Downcast {
        service: &'static str,
        expected: &'static str,
    },

    /// `Registry::validate` found missing dependencies or cycles
    #[error("dependency graph is invalid: {summary}")]
    InvalidGraph { summary: String },

    /// Error reported by the factory itself, passed through verbatim
    #[error(transparent)]
    Factory(anyhow::Error),
}

impl RegistryError {
    pub fn not_registered(service: &'static str) -> Self {
        Self::NotRegistered { service }
    }

    pub fn malformed(service: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedFactory {
            service,
            reason: reason.into(),
        }
    }

    pub fn is_not_registered(&self) -> bool {
        matches!(self, Self::NotRegistered { .. })
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    /// Service names along a chain of nested dependency failures, outermost
    /// first, ending with the service that actually failed when known.
    pub fn dependency_chain(&self) -> Vec<&'static str> {
        let mut chain = Vec::new();
        let mut current = self;
        while let Self::DependencyResolution { dependency, source } = current {
            chain.push(*dependency);
            current = source;
        }
        match current {
            Self::NotRegistered { service }
            | Self::CircularDependency { service, .. }
            | Self::DepthExceeded { service, .. } => {
                if chain.last() != Some(service) {
                    chain.push(*service);
                }
            }
            _ => {}
        }
        chain
    }

    /// Innermost error of a dependency chain
    pub fn innermost(&self) -> &RegistryError {
        let mut current = self;
        while let Self::DependencyResolution { source, .. } = current {
            current = source;
        }
        current
    }
}

impl From<anyhow::Error> for RegistryError {
    /// Registry errors that travelled through a factory's `anyhow::Result`
    /// (e.g. `registry.resolve_as::<T>()?` inside a factory) come back out
    /// as themselves; anything else is a factory-reported error.
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<RegistryError>() {
            Ok(registry_error) => registry_error,
            Err(other) => Self::Factory(other),
        }
    }
}

/// Errors raised while loading [`RegistryConfig`](crate::RegistryConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported configuration file format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}
