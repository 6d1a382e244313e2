//! Per-thread tracking of services currently being resolved.
//!
//! Resolution is synchronous, so the chain of nested `resolve` calls runs on
//! one thread. A service that shows up twice in that chain is a cycle; it is
//! reported before any descriptor lock is taken, so a self-referencing
//! singleton fails instead of blocking on its own creation lock.

use std::any::TypeId;
use std::cell::RefCell;

use crate::error::RegistryError;
use crate::service_type::ServiceType;

#[derive(Default)]
struct InFlight {
    /// (registry identity, service) pairs, outermost first
    stack: Vec<(usize, ServiceType)>,
}

thread_local! {
    static IN_FLIGHT: RefCell<InFlight> = RefCell::new(InFlight::default());
}

/// Marks a service as in flight until dropped
#[must_use]
pub(crate) struct ResolutionGuard {
    registry: usize,
    id: TypeId,
}

impl ResolutionGuard {
    /// Enter `service` for the registry identified by `registry`.
    ///
    /// Fails if the service is already being resolved by the same registry on
    /// this thread, or if the chain would grow past `max_depth`.
    pub(crate) fn enter(
        registry: usize,
        service: ServiceType,
        max_depth: usize,
    ) -> Result<Self, RegistryError> {
        IN_FLIGHT.with(|cell| {
            let mut in_flight = cell.borrow_mut();
            let chain: Vec<&ServiceType> = in_flight
                .stack
                .iter()
                .filter(|(owner, _)| *owner == registry)
                .map(|(_, entry)| entry)
                .collect();

            if let Some(start) = chain.iter().position(|entry| **entry == service) {
                let mut path: Vec<&str> = chain[start..].iter().map(|entry| entry.name()).collect();
                path.push(service.name());
                return Err(RegistryError::CircularDependency {
                    service: service.name(),
                    path: path.join(" -> "),
                });
            }

            let depth = chain.len() + 1;
            if depth > max_depth {
                return Err(RegistryError::DepthExceeded {
                    service: service.name(),
                    depth,
                    limit: max_depth,
                });
            }

            in_flight.stack.push((registry, service));
            Ok(Self {
                registry,
                id: service.id(),
            })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread teardown
        let _ = IN_FLIGHT.try_with(|cell| {
            let mut in_flight = cell.borrow_mut();
            if let Some(pos) = in_flight
                .stack
                .iter()
                .rposition(|(owner, entry)| *owner == self.registry && entry.id() == self.id)
            {
                in_flight.stack.remove(pos);
            }
        });
    }
}

#[cfg(test)]
/// Services in flight on this thread for `registry`, outermost first
pub(crate) fn current_path(registry: usize) -> Vec<ServiceType> {
    IN_FLIGHT.with(|cell| {
        cell.borrow()
            .stack
            .iter()
            .filter(|(owner, _)| *owner == registry)
            .map(|(_, service)| *service)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_reentering_service_reports_path() {
        let _alpha = ResolutionGuard::enter(1, ServiceType::of::<Alpha>(), 8).unwrap();
        let _beta = ResolutionGuard::enter(1, ServiceType::of::<Beta>(), 8).unwrap();

        let err = ResolutionGuard::enter(1, ServiceType::of::<Alpha>(), 8)
            .err()
            .expect("cycle");
        match err {
            RegistryError::CircularDependency { path, .. } => {
                let parts: Vec<&str> = path.split(" -> ").collect();
                assert_eq!(parts.len(), 3);
                assert!(parts[0].ends_with("Alpha"));
                assert!(parts[1].ends_with("Beta"));
                assert!(parts[2].ends_with("Alpha"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_guard_drop_pops_entry() {
        {
            let _guard = ResolutionGuard::enter(2, ServiceType::of::<Alpha>(), 8).unwrap();
            assert_eq!(current_path(2).len(), 1);
        }
        assert!(current_path(2).is_empty());
        let _again = ResolutionGuard::enter(2, ServiceType::of::<Alpha>(), 8).unwrap();
    }

    #[test]
    fn test_registries_are_tracked_independently() {
        let _outer = ResolutionGuard::enter(3, ServiceType::of::<Alpha>(), 8).unwrap();
        let _inner = ResolutionGuard::enter(4, ServiceType::of::<Alpha>(), 8).unwrap();
        assert_eq!(current_path(3).len(), 1);
        assert_eq!(current_path(4).len(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let _alpha = ResolutionGuard::enter(5, ServiceType::of::<Alpha>(), 1).unwrap();
        let err = ResolutionGuard::enter(5, ServiceType::of::<Beta>(), 1)
            .err()
            .expect("depth");
        assert!(matches!(err, RegistryError::DepthExceeded { depth: 2, limit: 1, .. }));
    }
}
