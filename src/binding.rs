use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
    sync::Arc,
};
use tracing::{debug, error};

use crate::{
    any::Instance,
    cache::{CacheState, CacheStatus},
    constraint::{self, Constraint, ConstraintTarget},
    context::Context,
    dependency_resolver::DependencyResolver,
    errors::{BindingErrorKind, InstantiateErrorKind, ResolveErrorKind},
    hooks::{boxed_activation, boxed_async_activation, boxed_async_deactivation, boxed_deactivation, BoxedActivation, BoxedDeactivation},
    instantiator::{Class, Constructor, Injectable, Instantiator, Provider},
    maybe_async::MaybeAsync,
    module::ModuleId,
    scope::BindingScope,
    service::{service_fn, BoxCloneService},
    service_id::ServiceId,
    utils::id::next_id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(u64);

impl BindingId {
    fn new() -> Self {
        Self(next_id())
    }
}

/// How a binding produces its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Constructs a type, resolving its declared dependencies first
    Instance,
    ConstantValue,
    FunctionValue,
    /// Calls a function with the resolution context every time the scope requires a new value
    ComputedValue,
    /// Hands back the class reference itself
    RawConstructor,
    Factory,
    Provider,
    /// Forwards to another identifier
    DelegateToService,
}

pub(crate) type BoxedComputed = BoxCloneService<Context, MaybeAsync<Instance, InstantiateErrorKind>, InstantiateErrorKind>;

#[derive(Clone)]
pub(crate) enum Implementation {
    Instance(Constructor),
    ConstantValue(Instance),
    FunctionValue(Instance),
    ComputedValue(BoxedComputed),
    RawConstructor(Class),
    Factory(BoxedComputed),
    Provider(BoxedComputed),
    DelegateToService(ServiceId),
}

impl Implementation {
    pub(crate) fn kind(&self) -> BindingKind {
        match self {
            Self::Instance(_) => BindingKind::Instance,
            Self::ConstantValue(_) => BindingKind::ConstantValue,
            Self::FunctionValue(_) => BindingKind::FunctionValue,
            Self::ComputedValue(_) => BindingKind::ComputedValue,
            Self::RawConstructor(_) => BindingKind::RawConstructor,
            Self::Factory(_) => BindingKind::Factory,
            Self::Provider(_) => BindingKind::Provider,
            Self::DelegateToService(_) => BindingKind::DelegateToService,
        }
    }

    /// Scope the kind is pinned to, if any
    fn fixed_scope(&self) -> Option<BindingScope> {
        match self {
            Self::ConstantValue(_) | Self::FunctionValue(_) | Self::RawConstructor(_) | Self::Factory(_) | Self::Provider(_) => {
                Some(BindingScope::Singleton)
            }
            // The target's own scope governs reuse
            Self::DelegateToService(_) => Some(BindingScope::Transient),
            Self::Instance(_) | Self::ComputedValue(_) => None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct BindingConfig {
    pub(crate) scope: BindingScope,
    pub(crate) scope_fixed: bool,
    pub(crate) implementation: Option<Implementation>,
    pub(crate) constraint: Option<Constraint>,
    pub(crate) on_activation: Vec<BoxedActivation>,
    pub(crate) on_deactivation: Vec<BoxedDeactivation>,
}

/// Registered recipe for satisfying one service identifier
pub struct Binding {
    id: BindingId,
    service_id: ServiceId,
    module_id: Option<ModuleId>,
    config: Mutex<BindingConfig>,
    cache: Mutex<CacheState>,
}

impl Binding {
    pub(crate) fn new(service_id: ServiceId, scope: BindingScope, module_id: Option<ModuleId>) -> Self {
        Self {
            id: BindingId::new(),
            service_id,
            module_id,
            config: Mutex::new(BindingConfig {
                scope,
                scope_fixed: false,
                implementation: None,
                constraint: None,
                on_activation: Vec::new(),
                on_deactivation: Vec::new(),
            }),
            cache: Mutex::new(CacheState::Unresolved),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> BindingId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    /// Module that registered the binding, `None` if it was bound on the container directly
    #[inline]
    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        self.module_id
    }

    #[must_use]
    pub fn scope(&self) -> BindingScope {
        self.config.lock().scope
    }

    /// Returns `None` until one of the `to*` methods configured the binding
    #[must_use]
    pub fn kind(&self) -> Option<BindingKind> {
        self.config.lock().implementation.as_ref().map(Implementation::kind)
    }

    #[must_use]
    pub fn cache_status(&self) -> CacheStatus {
        self.cache.lock().status()
    }

    #[must_use]
    pub fn is_constrained(&self) -> bool {
        self.config.lock().constraint.is_some()
    }

    pub(crate) fn config(&self) -> BindingConfig {
        self.config.lock().clone()
    }

    /// An unconstrained binding only matches requests without tags
    pub(crate) fn matches(&self, target: &ConstraintTarget<'_>) -> bool {
        let constraint = self.config.lock().constraint.clone();
        match constraint {
            Some(constraint) => constraint(target),
            None => target.tags.is_empty(),
        }
    }

    pub(crate) fn lookup_cache(&self) -> Option<MaybeAsync<Instance>> {
        self.cache.lock().lookup()
    }

    pub(crate) fn store(self: &Arc<Self>, value: MaybeAsync<Instance>) -> MaybeAsync<Instance> {
        self.cache.lock().store(value, Arc::downgrade(self))
    }

    pub(crate) fn settle(&self, result: &Result<Instance, Arc<ResolveErrorKind>>) {
        self.cache.lock().settle(result);
    }

    /// Takes the cached value out, leaving the cache unresolved
    pub(crate) fn take_cache(&self) -> CacheState {
        std::mem::take(&mut *self.cache.lock())
    }

    /// Copy with the same identity and a private cache, for snapshots
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            id: self.id,
            service_id: self.service_id.clone(),
            module_id: self.module_id,
            config: Mutex::new(self.config()),
            cache: Mutex::new(self.cache.lock().clone()),
        }
    }

    /// Fresh copy without any cached value, for merging containers
    pub(crate) fn duplicate_unresolved(&self) -> Self {
        Self {
            id: BindingId::new(),
            service_id: self.service_id.clone(),
            module_id: None,
            config: Mutex::new(self.config()),
            cache: Mutex::new(CacheState::Unresolved),
        }
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("service_id", &self.service_id)
            .field("scope", &self.scope())
            .field("kind", &self.kind())
            .field("cache_status", &self.cache_status())
            .field("module_id", &self.module_id)
            .finish()
    }
}

/// Configures a binding that is already registered in its container.
///
/// The kind can be set exactly once, and kinds that pin a scope reject later scope changes.
/// Every method returns the builder back, so configuration reads as a chain:
/// ```rust
/// use ligature::Container;
///
/// let container = Container::new();
/// container
///     .bind("Port")
///     .to_constant_value(8080u16)?
///     .when_named("http");
/// # Ok::<_, ligature::BindingErrorKind>(())
/// ```
pub struct BindingBuilder {
    binding: Arc<Binding>,
}

impl BindingBuilder {
    pub(crate) fn new(binding: Arc<Binding>) -> Self {
        Self { binding }
    }

    #[inline]
    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }

    fn set_implementation(self, implementation: Implementation) -> Result<Self, BindingErrorKind> {
        {
            let mut config = self.binding.config.lock();
            if config.implementation.is_some() {
                let err = BindingErrorKind::AlreadyConfigured {
                    service_id: self.binding.service_id.clone(),
                };
                error!("{}", err);
                return Err(err);
            }
            if let Some(scope) = implementation.fixed_scope() {
                config.scope = scope;
                config.scope_fixed = true;
            }

            debug!(service_id = %self.binding.service_id, kind = ?implementation.kind(), "Binding configured");

            config.implementation = Some(implementation);
        }
        Ok(self)
    }

    /// Binds to an [`Injectable`] type
    pub fn to<T: Injectable>(self) -> Result<Self, BindingErrorKind> {
        self.to_class(Class::of::<T>())
    }

    pub fn to_class(self, class: Class) -> Result<Self, BindingErrorKind> {
        self.set_implementation(Implementation::Instance(class.constructor()))
    }

    /// Binds a class identifier to its own class
    pub fn to_self(self) -> Result<Self, BindingErrorKind> {
        match self.binding.service_id.as_class() {
            Some(class) => {
                let class = *class;
                self.to_class(class)
            }
            None => {
                let err = BindingErrorKind::NotAClass {
                    service_id: self.binding.service_id.clone(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Binds to a closure whose arguments are injection markers
    pub fn to_instantiator<Inst, Deps>(self, instantiator: Inst) -> Result<Self, BindingErrorKind>
    where
        Inst: Instantiator<Deps> + Send + Sync,
        Deps: DependencyResolver,
    {
        self.set_implementation(Implementation::Instance(Constructor::from_instantiator(instantiator)))
    }

    pub fn to_constant_value<T: Send + Sync + 'static>(self, value: T) -> Result<Self, BindingErrorKind> {
        self.set_implementation(Implementation::ConstantValue(Arc::new(value)))
    }

    /// Binds to a function value, handed out as is
    pub fn to_function<F: Send + Sync + 'static>(self, function: F) -> Result<Self, BindingErrorKind> {
        self.set_implementation(Implementation::FunctionValue(Arc::new(function)))
    }

    pub fn to_dynamic_value<T, F, E>(self, mut compute: F) -> Result<Self, BindingErrorKind>
    where
        T: Send + Sync + 'static,
        F: FnMut(&Context) -> Result<T, E> + Clone + Send + Sync + 'static,
        E: Into<InstantiateErrorKind>,
    {
        self.set_implementation(Implementation::ComputedValue(BoxCloneService::new(service_fn(
            move |context: Context| -> Result<MaybeAsync<Instance, InstantiateErrorKind>, InstantiateErrorKind> {
                let value = compute(&context).map_err(Into::into)?;
                Ok(MaybeAsync::Ready(Arc::new(value)))
            },
        ))))
    }

    /// Binds to a function producing the value asynchronously.
    /// Synchronous resolution of such a binding, or of anything depending on it, fails with [`ResolveErrorKind::LazySync`]
    pub fn to_async_dynamic_value<T, F, Fut, E>(self, mut compute: F) -> Result<Self, BindingErrorKind>
    where
        T: Send + Sync + 'static,
        F: FnMut(Context) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<InstantiateErrorKind> + 'static,
    {
        self.set_implementation(Implementation::ComputedValue(BoxCloneService::new(service_fn(
            move |context: Context| -> Result<MaybeAsync<Instance, InstantiateErrorKind>, InstantiateErrorKind> {
                let future = compute(context);
                Ok(MaybeAsync::pending(async move {
                    let value = future.await.map_err(Into::into)?;
                    Ok(Arc::new(value) as Instance)
                }))
            },
        ))))
    }

    /// Binds to the class reference itself, without instantiating it
    pub fn to_constructor(self, class: Class) -> Result<Self, BindingErrorKind> {
        self.set_implementation(Implementation::RawConstructor(class))
    }

    /// Binds to a callable built once by `factory`; consumers resolve the callable and call it as often as they need
    pub fn to_factory<T, F, E>(self, mut factory: F) -> Result<Self, BindingErrorKind>
    where
        T: Send + Sync + 'static,
        F: FnMut(&Context) -> Result<T, E> + Clone + Send + Sync + 'static,
        E: Into<InstantiateErrorKind>,
    {
        self.set_implementation(Implementation::Factory(BoxCloneService::new(service_fn(
            move |context: Context| -> Result<MaybeAsync<Instance, InstantiateErrorKind>, InstantiateErrorKind> {
                let callable = factory(&context).map_err(Into::into)?;
                Ok(MaybeAsync::Ready(Arc::new(callable)))
            },
        ))))
    }

    /// Binds to a [`Provider`]: every call of the injected provider runs `provider` again
    pub fn to_provider<T, F, Fut, E>(self, provider: F) -> Result<Self, BindingErrorKind>
    where
        T: Send + Sync + 'static,
        F: Fn(Context) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, E>> + Send + 'static,
        E: Into<InstantiateErrorKind> + 'static,
    {
        self.set_implementation(Implementation::Provider(BoxCloneService::new(service_fn(
            move |context: Context| -> Result<MaybeAsync<Instance, InstantiateErrorKind>, InstantiateErrorKind> {
                let provider = provider.clone();
                let Context {
                    container,
                    service_id,
                    parent,
                } = context;
                let container = container.downgrade();

                let callable: Provider<T> = Arc::new(move || -> BoxFuture<'static, Result<Arc<T>, InstantiateErrorKind>> {
                    let context = container.upgrade().map(|container| Context {
                        container,
                        service_id: service_id.clone(),
                        parent: parent.clone(),
                    });
                    let future = context.map(&provider);
                    Box::pin(async move {
                        match future {
                            Some(future) => future.await.map_err(Into::into),
                            None => Err(InstantiateErrorKind::Custom(anyhow::anyhow!("Container of the provider was dropped"))),
                        }
                    })
                });
                Ok(MaybeAsync::Ready(Arc::new(callable)))
            },
        ))))
    }

    /// Forwards resolution to another identifier. The binding itself never caches
    pub fn to_service(self, service_id: impl Into<ServiceId>) -> Result<Self, BindingErrorKind> {
        self.set_implementation(Implementation::DelegateToService(service_id.into()))
    }

    pub fn in_scope(self, scope: BindingScope) -> Result<Self, BindingErrorKind> {
        {
            let mut config = self.binding.config.lock();
            if config.scope_fixed && config.scope != scope {
                let err = BindingErrorKind::FixedScope {
                    service_id: self.binding.service_id.clone(),
                    scope: config.scope,
                };
                error!("{}", err);
                return Err(err);
            }
            config.scope = scope;
        }
        Ok(self)
    }

    #[inline]
    pub fn in_singleton_scope(self) -> Result<Self, BindingErrorKind> {
        self.in_scope(BindingScope::Singleton)
    }

    #[inline]
    pub fn in_transient_scope(self) -> Result<Self, BindingErrorKind> {
        self.in_scope(BindingScope::Transient)
    }

    #[inline]
    pub fn in_request_scope(self) -> Result<Self, BindingErrorKind> {
        self.in_scope(BindingScope::Request)
    }

    fn constrain(self, constraint: Constraint) -> Self {
        self.binding.config.lock().constraint = Some(constraint);
        self
    }

    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(&ConstraintTarget<'_>) -> bool + Send + Sync + 'static,
    {
        self.constrain(constraint::constraint(predicate))
    }

    pub fn when_named(self, name: &'static str) -> Self {
        self.constrain(constraint::named(name))
    }

    pub fn when_tagged(self, key: &'static str, value: &'static str) -> Self {
        self.constrain(constraint::tagged(key, value))
    }

    /// Matches only when the direct dependent is `parent`
    pub fn when_injected_into(self, parent: impl Into<ServiceId>) -> Self {
        self.constrain(constraint::injected_into(parent.into()))
    }

    pub fn when_any_ancestor_is(self, ancestor: impl Into<ServiceId>) -> Self {
        self.constrain(constraint::any_ancestor_is(ancestor.into()))
    }

    pub fn when_no_ancestor_is(self, ancestor: impl Into<ServiceId>) -> Self {
        self.constrain(constraint::no_ancestor_is(ancestor.into()))
    }

    /// Adds a hook that runs on every newly constructed value, before any container hook
    pub fn on_activation<T, F, E>(self, activation: F) -> Self
    where
        T: Send + Sync + 'static,
        F: FnMut(&Context, Arc<T>) -> Result<Arc<T>, E> + Clone + Send + Sync + 'static,
        E: Into<InstantiateErrorKind>,
    {
        self.binding.config.lock().on_activation.push(boxed_activation(activation));
        self
    }

    pub fn on_activation_async<T, F, Fut, E>(self, activation: F) -> Self
    where
        T: Send + Sync + 'static,
        F: FnMut(Context, Arc<T>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, E>> + Send + 'static,
        E: Into<InstantiateErrorKind> + 'static,
    {
        self.binding.config.lock().on_activation.push(boxed_async_activation(activation));
        self
    }

    /// Adds a hook that runs on the cached value when the binding is removed
    pub fn on_deactivation<T, F, E>(self, deactivation: F) -> Self
    where
        T: Send + Sync + 'static,
        F: FnMut(Arc<T>) -> Result<(), E> + Clone + Send + Sync + 'static,
        E: Into<InstantiateErrorKind>,
    {
        self.binding.config.lock().on_deactivation.push(boxed_deactivation(deactivation));
        self
    }

    pub fn on_deactivation_async<T, F, Fut, E>(self, deactivation: F) -> Self
    where
        T: Send + Sync + 'static,
        F: FnMut(Arc<T>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<InstantiateErrorKind> + 'static,
    {
        self.binding.config.lock().on_deactivation.push(boxed_async_deactivation(deactivation));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{Binding, BindingBuilder, BindingKind};
    use crate::{
        cache::CacheStatus, constraint::ConstraintTarget, errors::BindingErrorKind, maybe_async::MaybeAsync,
        scope::BindingScope, service_id::ServiceId, service_id::Tag, Arguments, Injectable, InstantiateErrorKind,
    };

    use std::sync::Arc;

    struct Katana;

    impl Injectable for Katana {
        fn construct(_: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
            Ok(Self)
        }
    }

    fn unregistered(service_id: ServiceId) -> (BindingBuilder, Arc<Binding>) {
        let binding = Arc::new(Binding::new(service_id, BindingScope::Transient, None));
        (BindingBuilder::new(binding.clone()), binding)
    }

    #[test]
    fn test_kind_is_set_once() {
        let (builder, binding) = unregistered(ServiceId::name("Weapon"));
        assert_eq!(binding.kind(), None);

        let builder = builder.to_constant_value(1u8).unwrap();
        assert_eq!(binding.kind(), Some(BindingKind::ConstantValue));
        assert!(matches!(builder.to_function(|| 1u8), Err(BindingErrorKind::AlreadyConfigured { .. })));
    }

    #[test]
    fn test_fixed_scope() {
        let (builder, binding) = unregistered(ServiceId::name("Weapon"));

        let builder = builder.to_constant_value(1u8).unwrap();
        assert_eq!(binding.scope(), BindingScope::Singleton);

        let builder = builder.in_singleton_scope().unwrap();
        assert!(matches!(builder.in_transient_scope(), Err(BindingErrorKind::FixedScope { .. })));
    }

    #[test]
    fn test_delegate_is_never_cached() {
        let (builder, binding) = unregistered(ServiceId::name("Weapon"));

        let builder = builder.to_service(ServiceId::class::<Katana>()).unwrap();
        assert_eq!(binding.scope(), BindingScope::Transient);
        assert!(builder.in_singleton_scope().is_err());
    }

    #[test]
    fn test_to_self() {
        let (builder, binding) = unregistered(ServiceId::class::<Katana>());
        let _ = builder.to_self().unwrap();
        assert_eq!(binding.kind(), Some(BindingKind::Instance));

        let (builder, _) = unregistered(ServiceId::of::<Katana>());
        assert!(matches!(builder.to_self(), Err(BindingErrorKind::NotAClass { .. })));
    }

    #[test]
    fn test_matches() {
        let (builder, binding) = unregistered(ServiceId::name("Weapon"));
        let service_id = ServiceId::name("Weapon");
        let named = [Tag::named("katana")];
        let untagged = ConstraintTarget {
            service_id: &service_id,
            tags: &[],
            ancestors: &[],
        };
        let tagged = ConstraintTarget { tags: &named, ..untagged };

        assert!(binding.matches(&untagged));
        assert!(!binding.matches(&tagged));

        let _ = builder.when_named("katana");
        assert!(!binding.matches(&untagged));
        assert!(binding.matches(&tagged));
        assert!(binding.is_constrained());
    }

    #[test]
    fn test_duplicate_has_private_cache() {
        let binding = Arc::new(Binding::new(ServiceId::name("Weapon"), BindingScope::Singleton, None));
        let copy = binding.duplicate();

        let _ = binding.store(MaybeAsync::Ready(Arc::new(1u8)));

        assert_eq!(binding.cache_status(), CacheStatus::Resolved);
        assert_eq!(copy.cache_status(), CacheStatus::Unresolved);
        assert_eq!(copy.id(), binding.id());
        assert_ne!(binding.duplicate_unresolved().id(), binding.id());
    }
}
