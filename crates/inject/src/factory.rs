//! Type-erased factories.
//!
//! A [`Factory`] has a fixed shape: a declared parameter list and a body that
//! turns the bound arguments into an [`Instance`]. The typed constructors
//! derive both from ordinary closures, so the checks a dynamic container
//! would do by inspecting a callable (arity, error result, parameter types)
//! are done by the compiler here.
//!
//! Every instance is stored as `Arc<dyn Any>` holding an `Arc<T>` for the
//! service `T` it was produced for. Holding `Arc<T>` rather than `T` lets the
//! same representation carry trait objects (`Arc<dyn Logger>`).

use std::any::{type_name, Any};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::registry::Registry;
use crate::service_type::ServiceType;

/// Type-erased service instance, always an `Arc<T>` for its service `T`
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) fn pack<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Instance {
    Arc::new(value)
}

pub(crate) fn unpack<T: ?Sized + Send + Sync + 'static>(instance: &Instance) -> Option<Arc<T>> {
    instance.downcast_ref::<Arc<T>>().cloned()
}

/// Downcast a resolved instance to the service it was requested as
pub fn downcast_instance<T: ?Sized + Send + Sync + 'static>(
    instance: &Instance,
) -> Result<Arc<T>, RegistryError> {
    unpack::<T>(instance).ok_or(RegistryError::Downcast {
        service: type_name::<T>(),
        expected: type_name::<Arc<T>>(),
    })
}

/// One entry of a factory's declared parameter list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Bound to the resolving registry itself, never resolved recursively
    Registry,
    /// Resolved recursively against the same registry
    Service(ServiceType),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Registry => f.write_str("Registry"),
            Param::Service(service) => write!(f, "{}", service),
        }
    }
}

/// A bound parameter value
pub enum Argument {
    Registry(Registry),
    Service(Instance),
}

/// Bound parameter values, consumed in declaration order
pub struct Arguments {
    values: VecDeque<Argument>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Argument>) -> Self {
        Self {
            values: values.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take the next argument as `D`
    pub fn take<D: Dependency>(&mut self) -> Result<D, RegistryError> {
        let argument = self.values.pop_front().ok_or_else(|| {
            RegistryError::malformed(
                type_name::<D>(),
                "fewer arguments bound than parameters declared",
            )
        })?;
        D::from_argument(argument)
    }
}

/// A value a factory can declare as a parameter.
///
/// `Arc<T>` resolves the service `T` (sized or `dyn`); [`Registry`] binds the
/// back-reference for ad-hoc lookups.
pub trait Dependency: Sized + 'static {
    fn param() -> Param;

    fn from_argument(argument: Argument) -> Result<Self, RegistryError>;
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Arc<T> {
    fn param() -> Param {
        Param::Service(ServiceType::of::<T>())
    }

    fn from_argument(argument: Argument) -> Result<Self, RegistryError> {
        match argument {
            Argument::Service(instance) => downcast_instance::<T>(&instance),
            Argument::Registry(_) => Err(RegistryError::Downcast {
                service: type_name::<T>(),
                expected: type_name::<Arc<T>>(),
            }),
        }
    }
}

impl Dependency for Registry {
    fn param() -> Param {
        Param::Registry
    }

    fn from_argument(argument: Argument) -> Result<Self, RegistryError> {
        match argument {
            Argument::Registry(registry) => Ok(registry),
            Argument::Service(_) => Err(RegistryError::Downcast {
                service: type_name::<Registry>(),
                expected: type_name::<Registry>(),
            }),
        }
    }
}

/// A tuple of [`Dependency`] values, i.e. a factory's parameter list
pub trait Dependencies: Sized + 'static {
    fn params() -> Vec<Param>;

    fn from_arguments(arguments: &mut Arguments) -> Result<Self, RegistryError>;
}

impl Dependencies for () {
    fn params() -> Vec<Param> {
        Vec::new()
    }

    fn from_arguments(_arguments: &mut Arguments) -> Result<Self, RegistryError> {
        Ok(())
    }
}

macro_rules! impl_dependencies {
    ($($name:ident),+) => {
        impl<$($name: Dependency),+> Dependencies for ($($name,)+) {
            fn params() -> Vec<Param> {
                vec![$($name::param()),+]
            }

            fn from_arguments(arguments: &mut Arguments) -> Result<Self, RegistryError> {
                Ok(($(arguments.take::<$name>()?,)+))
            }
        }
    };
}

impl_dependencies!(A);
impl_dependencies!(A, B);
impl_dependencies!(A, B, C);
impl_dependencies!(A, B, C, D);
impl_dependencies!(A, B, C, D, E);
impl_dependencies!(A, B, C, D, E, F);
impl_dependencies!(A, B, C, D, E, F, G);
impl_dependencies!(A, B, C, D, E, F, G, H);

/// Compile-time proof that `Self` satisfies capability `I`.
///
/// Implement it with [`provides!`](crate::provides); the coercion inside only
/// compiles when `Self: I`.
pub trait Provides<I: ?Sized>: Send + Sync + 'static {
    fn provide(self: Arc<Self>) -> Arc<I>;
}

/// Implement [`Provides`] for one or more capabilities.
///
/// ```rust,ignore
/// provides!(ConsoleLogger => dyn Logger, dyn Flush);
/// ```
#[macro_export]
macro_rules! provides {
    ($implementation:ty => $($capability:ty),+ $(,)?) => {
        $(
            impl $crate::Provides<$capability> for $implementation {
                fn provide(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$capability> {
                    self
                }
            }
        )+
    };
}

/// How a factory's result relates to a service type it can be stored under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Result type is the service type
    Exact,
    /// One is an `Arc` of the other
    Indirection,
    /// Result type provides the capability
    Capability,
}

type Convert = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

fn convert<F>(f: F) -> Convert
where
    F: Fn(&Instance) -> Option<Instance> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A service type the factory's result can be presented as
#[derive(Clone)]
pub(crate) struct View {
    pub(crate) target: ServiceType,
    pub(crate) relation: Relation,
    convert: Convert,
}

impl View {
    fn exact<R: ?Sized + 'static>() -> Self {
        Self {
            target: ServiceType::of::<R>(),
            relation: Relation::Exact,
            convert: convert(|instance| Some(instance.clone())),
        }
    }

    /// `R` seen as `Arc<R>`
    fn wrapped<R: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            target: ServiceType::of::<Arc<R>>(),
            relation: Relation::Indirection,
            convert: convert(|instance| {
                let inner = unpack::<R>(instance)?;
                Some(pack::<Arc<R>>(Arc::new(inner)))
            }),
        }
    }

    /// `Arc<T>` seen as `T`
    fn unwrapped<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            target: ServiceType::of::<T>(),
            relation: Relation::Indirection,
            convert: convert(|instance| {
                let outer = unpack::<Arc<T>>(instance)?;
                Some(pack::<T>(Arc::clone(&*outer)))
            }),
        }
    }

    fn capability<R, I>(cast: fn(Arc<R>) -> Arc<I>) -> Self
    where
        R: Send + Sync + 'static,
        I: ?Sized + Send + Sync + 'static,
    {
        Self {
            target: ServiceType::of::<I>(),
            relation: Relation::Capability,
            convert: convert(move |instance| {
                let concrete = unpack::<R>(instance)?;
                Some(pack::<I>(cast(concrete)))
            }),
        }
    }

    pub(crate) fn apply(&self, instance: &Instance) -> Option<Instance> {
        (self.convert)(instance)
    }
}

type Body = Arc<dyn Fn(Arguments) -> Result<Instance, RegistryError> + Send + Sync>;

fn body<F>(f: F) -> Body
where
    F: Fn(Arguments) -> Result<Instance, RegistryError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A type-erased factory: declared parameters, a body, and the service types
/// its result can be presented as.
#[derive(Clone)]
pub struct Factory {
    produces: ServiceType,
    params: Vec<Param>,
    body: Body,
    views: Vec<View>,
    defects: Vec<String>,
}

impl Factory {
    /// Factory receiving the registry, returning `anyhow::Result<R>`.
    ///
    /// ```rust,ignore
    /// Factory::new(|registry: &Registry| {
    ///     let logger = registry.resolve_as::<dyn Logger>()?;
    ///     Ok(UserService { logger })
    /// })
    /// ```
    pub fn new<R, F>(f: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&Registry) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        Self::typed::<R>(
            vec![Param::Registry],
            body(move |mut arguments| {
                let registry: Registry = arguments.take()?;
                let value = f(&registry)?;
                Ok(pack(Arc::new(value)))
            }),
        )
    }

    /// Factory that cannot fail
    pub fn infallible<R, F>(f: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&Registry) -> R + Send + Sync + 'static,
    {
        Self::new(move |registry| Ok(f(registry)))
    }

    /// Factory with a declared parameter list.
    ///
    /// Each tuple element is resolved by the registry before `f` runs; a
    /// failing one aborts creation with
    /// [`RegistryError::DependencyResolution`].
    ///
    /// ```rust,ignore
    /// Factory::inject(|(logger, repo): (Arc<dyn Logger>, Arc<UserRepository>)| {
    ///     Ok(UserService { logger, repo })
    /// })
    /// ```
    pub fn inject<R, D, F>(f: F) -> Self
    where
        R: Send + Sync + 'static,
        D: Dependencies,
        F: Fn(D) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        Self::typed::<R>(
            D::params(),
            body(move |mut arguments| {
                let deps = D::from_arguments(&mut arguments)?;
                let value = f(deps)?;
                Ok(pack(Arc::new(value)))
            }),
        )
    }

    /// Factory whose result is already shared (`Arc<T>`).
    ///
    /// The result type is an indirection of `T`, so the factory can be
    /// registered under `T` as well as under `Arc<T>`. `T` may be a trait
    /// object.
    pub fn shared<T, F>(f: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Registry) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        let mut factory = Self::typed::<Arc<T>>(
            vec![Param::Registry],
            body(move |mut arguments| {
                let registry: Registry = arguments.take()?;
                let value = f(&registry)?;
                Ok(pack::<Arc<T>>(Arc::new(value)))
            }),
        );
        factory.views.push(View::unwrapped::<T>());
        factory
    }

    /// Factory that ignores the registry and always yields `value`
    pub fn from_arc<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self::typed::<T>(
            Vec::new(),
            body(move |_| Ok(pack::<T>(Arc::clone(&value)))),
        )
    }

    fn typed<R: ?Sized + Send + Sync + 'static>(params: Vec<Param>, body: Body) -> Self {
        Self {
            produces: ServiceType::of::<R>(),
            params,
            body,
            views: vec![View::exact::<R>(), View::wrapped::<R>()],
            defects: Vec::new(),
        }
    }

    /// Declare that the result `R` satisfies capability `I`.
    ///
    /// `cast` is usually `|concrete| concrete`; the unsizing coercion only
    /// compiles when `R` implements `I`. Declaring a cast for a type other
    /// than the factory's result makes the factory malformed.
    pub fn provides<R, I>(mut self, cast: fn(Arc<R>) -> Arc<I>) -> Self
    where
        R: Send + Sync + 'static,
        I: ?Sized + Send + Sync + 'static,
    {
        let source = ServiceType::of::<R>();
        if source != self.produces {
            self.defects.push(format!(
                "capability {} is declared for {} but the factory returns {}",
                type_name::<I>(),
                source,
                self.produces
            ));
            return self;
        }
        self.views.push(View::capability(cast));
        self
    }

    /// [`provides`](Self::provides) using a [`Provides`] impl
    pub fn with_capability<R, I>(self) -> Self
    where
        R: Provides<I>,
        I: ?Sized + Send + Sync + 'static,
    {
        self.provides::<R, I>(<R as Provides<I>>::provide)
    }

    /// Declared result type
    pub fn produces(&self) -> ServiceType {
        self.produces
    }

    /// Declared parameter list
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Services this factory resolves recursively (excludes the registry
    /// back-reference)
    pub fn dependencies(&self) -> impl Iterator<Item = ServiceType> + '_ {
        self.params.iter().filter_map(|param| match param {
            Param::Service(service) => Some(*service),
            Param::Registry => None,
        })
    }

    pub(crate) fn view_for(&self, service: &ServiceType) -> Option<&View> {
        self.views.iter().find(|view| view.target == *service)
    }

    pub(crate) fn defects(&self) -> &[String] {
        &self.defects
    }

    pub(crate) fn invoke(&self, arguments: Arguments) -> Result<Instance, RegistryError> {
        (self.body)(arguments)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("produces", &self.produces)
            .field("params", &self.params)
            .field(
                "satisfies",
                &self.views.iter().map(|v| v.target.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send + Sync {
        fn area(&self) -> f64;
    }

    #[derive(Debug)]
    struct Square(f64);

    impl Shape for Square {
        fn area(&self) -> f64 {
            self.0 * self.0
        }
    }

    provides!(Square => dyn Shape);

    #[test]
    fn test_typed_factory_declares_registry_param() {
        let factory = Factory::new(|_| Ok(Square(2.0)));
        assert_eq!(factory.params(), &[Param::Registry]);
        assert_eq!(factory.produces(), ServiceType::of::<Square>());
        assert_eq!(factory.dependencies().count(), 0);
    }

    #[test]
    fn test_inject_factory_declares_tuple_params() {
        let factory = Factory::inject(|(square, _registry): (Arc<Square>, Registry)| {
            Ok(square.0 as u64)
        });
        assert_eq!(
            factory.params(),
            &[Param::Service(ServiceType::of::<Square>()), Param::Registry]
        );
        assert_eq!(
            factory.dependencies().collect::<Vec<_>>(),
            vec![ServiceType::of::<Square>()]
        );
    }

    #[test]
    fn test_capability_view_casts_instance() {
        let factory = Factory::from_arc(Arc::new(Square(3.0))).with_capability::<Square, dyn Shape>();
        let view = factory
            .view_for(&ServiceType::of::<dyn Shape>())
            .expect("capability view");
        assert_eq!(view.relation, Relation::Capability);

        let produced = factory.invoke(Arguments::new(Vec::new())).unwrap();
        let shape = downcast_instance::<dyn Shape>(&view.apply(&produced).unwrap()).unwrap();
        assert_eq!(shape.area(), 9.0);
    }

    #[test]
    fn test_shared_factory_can_be_viewed_as_inner_type() {
        let factory = Factory::shared(|_| Ok(Arc::new(Square(1.5))));
        assert_eq!(factory.produces(), ServiceType::of::<Arc<Square>>());
        assert!(factory.view_for(&ServiceType::of::<Square>()).is_some());
        assert!(factory.view_for(&ServiceType::of::<Arc<Arc<Square>>>()).is_some());
    }

    #[test]
    fn test_mismatched_cast_is_recorded_as_defect() {
        let factory = Factory::from_arc(Arc::new(1u32)).provides::<Square, dyn Shape>(|s| s as Arc<dyn Shape>);
        assert_eq!(factory.defects().len(), 1);
        assert!(factory.view_for(&ServiceType::of::<dyn Shape>()).is_none());
    }

    #[test]
    fn test_missing_argument_is_reported() {
        let mut arguments = Arguments::new(Vec::new());
        assert!(arguments.is_empty());
        let err = arguments.take::<Arc<Square>>().unwrap_err();
        assert!(matches!(err, RegistryError::MalformedFactory { .. }));
    }
}
