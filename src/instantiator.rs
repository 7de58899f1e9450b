use futures::future::BoxFuture;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};
use tracing::debug;

use super::{
    dependency::{Arguments, Dependency, Injected},
    dependency_resolver::DependencyResolver,
    errors::InstantiateErrorKind,
    service::{service_fn, BoxCloneService, Service as _},
};
use crate::{
    any::{Instance, TypeInfo},
    hooks::BoxedDeactivation,
    maybe_async::MaybeAsync,
};

pub trait Instantiator<Deps>: Clone + 'static
where
    Deps: DependencyResolver,
{
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + 'static,
            Response: Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver + Send, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

/// A type that describes its own dependencies and knows how to build itself from them.
///
/// Constructor dependencies are read from [`Arguments`] in the order [`Injectable::dependencies`] declares them,
/// property dependencies are delivered afterwards through [`Injectable::inject`].
///
/// # Examples
/// ```rust
/// use ligature::{Arguments, Dependency, Injectable, InstantiateErrorKind};
/// use std::sync::Arc;
///
/// struct Katana;
///
/// impl Injectable for Katana {
///     fn construct(_: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
///         Ok(Self)
///     }
/// }
///
/// struct Ninja {
///     katana: Arc<Katana>,
/// }
///
/// impl Injectable for Ninja {
///     fn dependencies() -> Vec<Dependency> {
///         vec![Dependency::class::<Katana>()]
///     }
///
///     fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
///         Ok(Self { katana: arguments.next()? })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind>;

    /// Receives a property dependency after construction
    #[allow(unused_variables)]
    fn inject(&mut self, property: &'static str, value: Injected) -> Result<(), InstantiateErrorKind> {
        Ok(())
    }

    /// Set when [`Injectable::pre_destroy`] can return a pending result.
    /// Synchronous unbinding of such a type fails with [`crate::UnbindErrorKind::LazySync`] before any hook runs
    const ASYNC_PRE_DESTROY: bool = false;

    /// Runs when the cached instance is deactivated, after every deactivation hook
    fn pre_destroy(self: Arc<Self>) -> Result<MaybeAsync<(), InstantiateErrorKind>, InstantiateErrorKind> {
        Ok(MaybeAsync::Ready(()))
    }
}

pub(crate) type BoxedConstruct = BoxCloneService<Arguments, Instance, InstantiateErrorKind>;

/// Type-erased recipe for building an instance
#[derive(Clone)]
pub(crate) struct Constructor {
    pub(crate) type_info: TypeInfo,
    pub(crate) dependencies: Arc<[Dependency]>,
    pub(crate) construct: BoxedConstruct,
    pub(crate) destroy: Option<BoxedDeactivation>,
}

impl Constructor {
    #[must_use]
    pub(crate) fn of<T: Injectable>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            dependencies: T::dependencies().into(),
            construct: BoxCloneService::new(service_fn(|mut arguments: Arguments| -> Result<Instance, InstantiateErrorKind> {
                let mut instance = T::construct(&mut arguments)?;
                for (property, value) in arguments.take_properties() {
                    instance.inject(property, value)?;
                }

                debug!("Constructed");

                Ok(Arc::new(instance) as Instance)
            })),
            destroy: Some(BoxedDeactivation::new(
                BoxCloneService::new(service_fn(|instance: Instance| -> Result<MaybeAsync<(), InstantiateErrorKind>, InstantiateErrorKind> {
                    let instance = instance.downcast::<T>().map_err(|_| InstantiateErrorKind::IncorrectType {
                        expected: TypeInfo::of::<T>(),
                    })?;
                    instance.pre_destroy()
                })),
                T::ASYNC_PRE_DESTROY,
            )),
        }
    }

    #[must_use]
    pub(crate) fn from_instantiator<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps> + Send + Sync,
        Deps: DependencyResolver,
    {
        Self {
            type_info: TypeInfo::of::<Inst::Provides>(),
            dependencies: Deps::dependencies().into(),
            construct: BoxCloneService::new(service_fn(move |mut arguments: Arguments| -> Result<Instance, InstantiateErrorKind> {
                let dependencies = Deps::resolve(&mut arguments)?;
                let dependency = instantiator.clone().instantiate(dependencies).map_err(Into::into)?;

                debug!("Constructed");

                Ok(Arc::new(dependency) as Instance)
            })),
            destroy: None,
        }
    }
}

/// Runtime class reference of an [`Injectable`] type
#[derive(Clone, Copy)]
pub struct Class {
    type_info: TypeInfo,
    constructor: fn() -> Constructor,
}

impl Class {
    #[inline]
    #[must_use]
    pub fn of<T: Injectable>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            constructor: Constructor::of::<T>,
        }
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// Builds a new instance from already resolved arguments, outside of any container
    ///
    /// # Errors
    /// Returns the error of the type's constructor or property injection
    pub fn instantiate(&self, arguments: Arguments) -> Result<Instance, InstantiateErrorKind> {
        self.constructor().construct.call(arguments)
    }

    #[inline]
    #[must_use]
    pub(crate) fn constructor(&self) -> Constructor {
        (self.constructor)()
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.type_info == other.type_info
    }
}

impl Eq for Class {}

impl Debug for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Class").field(&self.type_info.name).finish()
    }
}

/// Callable injected for a provider binding; every call produces a value asynchronously
pub type Provider<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<T>, InstantiateErrorKind>> + Send + Sync>;
