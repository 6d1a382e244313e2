use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::size_of;

/// Whether a service key names a concrete type or an abstract capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// A sized type, compared by identity
    Concrete,
    /// A trait object (`dyn Trait`), satisfied by any type that provides it
    Capability,
}

/// Key under which a factory is registered and resolved.
///
/// Equality and hashing use the `TypeId` only; name and kind are descriptive
/// and drive registration checks and error messages.
#[derive(Clone, Copy)]
pub struct ServiceType {
    id: TypeId,
    name: &'static str,
    kind: ServiceKind,
}

impl ServiceType {
    /// Key for `T`. Unsized types (trait objects) are capabilities, sized
    /// types are concrete.
    pub fn of<T: ?Sized + 'static>() -> Self {
        // &T is a fat pointer exactly when T is unsized
        let kind = if size_of::<&T>() > size_of::<&()>() {
            ServiceKind::Capability
        } else {
            ServiceKind::Concrete
        };
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind,
        }
    }

    pub fn concrete<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ServiceKind::Concrete,
        }
    }

    pub fn capability<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ServiceKind::Capability,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn is_capability(&self) -> bool {
        self.kind == ServiceKind::Capability
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
