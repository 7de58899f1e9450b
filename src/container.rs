use parking_lot::Mutex;
use std::{
    collections::BTreeSet,
    fmt::{self, Debug, Formatter},
    future::Future,
    sync::{Arc, Weak},
};
use tower_layer::Layer;
use tracing::{debug, error, info_span, Instrument as _};

use crate::{
    any::{downcast, Instance},
    binding::{Binding, BindingBuilder, BindingId, Implementation},
    cache::CacheStatus,
    config::ContainerOptions,
    constraint::ConstraintTarget,
    context::Context,
    dependency::Injected,
    errors::{ConfigErrorKind, ContainerErrorKind, DeactivateError, InstantiateErrorKind, ResolveErrorKind, UnbindErrorKind},
    hooks::{
        boxed_activation, boxed_async_activation, boxed_async_deactivation, boxed_deactivation, BoxedActivation, BoxedDeactivation,
        HookTable, ModuleActivationStore,
    },
    instantiator::{Constructor, Injectable},
    maybe_async::MaybeAsync,
    middleware::{self, Next, ResolveArgs},
    module::{AsyncContainerModule, ContainerModule, ModuleBinder, ModuleId},
    planner::{self, Plan},
    registry::Registry,
    resolver,
    service::{BoxCloneService, Service},
    service_id::{ServiceId, Tag},
    utils::id::next_id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(u64);

/// Options of [`Container::get_all_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetAllOptions {
    /// Select only bindings whose constraints match an untagged request
    pub enforce_constraints: bool,
}

/// Everything a snapshot captures
#[derive(Default)]
struct State {
    registry: Registry,
    activations: HookTable<BoxedActivation>,
    deactivations: HookTable<BoxedDeactivation>,
    module_store: ModuleActivationStore,
    middleware: Option<Next>,
}

impl State {
    fn duplicate(&self) -> Self {
        Self {
            registry: self.registry.duplicate(),
            activations: self.activations.clone(),
            deactivations: self.deactivations.clone(),
            module_store: self.module_store.clone(),
            middleware: self.middleware.clone(),
        }
    }
}

struct ContainerInner {
    id: ContainerId,
    options: ContainerOptions,
    /// Set once, when the container is created
    parent: Option<Container>,
    state: Mutex<State>,
    snapshots: Mutex<Vec<State>>,
}

/// Cached value of one binding, with the hooks that tear it down
struct Deactivation {
    service_id: ServiceId,
    instance: MaybeAsync<Instance>,
    hooks: Vec<BoxedDeactivation>,
}

/// Container of bindings.
///
/// Cloning is cheap and every clone refers to the same container.
/// ```rust
/// use ligature::Container;
///
/// struct Logger;
///
/// let container = Container::new();
/// container.bind("Logger").to_constant_value(Logger)?;
///
/// let first = container.get::<Logger>("Logger")?;
/// let second = container.get::<Logger>("Logger")?;
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

#[derive(Clone)]
pub(crate) struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    pub(crate) fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    #[must_use]
    pub fn with_options(options: ContainerOptions) -> Self {
        Self::init(options, None)
    }

    /// Creates a container from string options, see [`ContainerOptions::from_pairs`]
    ///
    /// # Errors
    /// Returns [`ConfigErrorKind`] if an option is unknown or has an invalid value
    pub fn from_config<'a, I>(pairs: I) -> Result<Self, ConfigErrorKind>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        match ContainerOptions::from_pairs(pairs) {
            Ok(options) => Ok(Self::with_options(options)),
            Err(err) => {
                error!("{}", err);
                Err(err)
            }
        }
    }

    fn init(options: ContainerOptions, parent: Option<Container>) -> Self {
        let container = Self {
            inner: Arc::new(ContainerInner {
                id: ContainerId(next_id()),
                options,
                parent,
                state: Mutex::new(State::default()),
                snapshots: Mutex::new(Vec::new()),
            }),
        };
        debug!(id = ?container.inner.id, ?options, "Container created");
        container
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.inner.id
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> ContainerOptions {
        self.inner.options
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Creates a child that inherits the options of this container.
    /// The child resolves identifiers it has no bindings for through this container.
    #[must_use]
    pub fn create_child(&self) -> Container {
        self.create_child_with(self.inner.options)
    }

    #[must_use]
    pub fn create_child_with(&self, options: ContainerOptions) -> Container {
        Self::init(options, Some(self.clone()))
    }

    /// Creates a standalone container with copies of the bindings of every container, in order.
    /// Copies share no cached values with their originals.
    #[must_use]
    pub fn merge(containers: &[&Container]) -> Container {
        let merged = Container::new();
        for container in containers {
            let bindings = container.inner.state.lock().registry.all();
            let mut state = merged.inner.state.lock();
            for binding in bindings {
                state.registry.add(Arc::new(binding.duplicate_unresolved()));
            }
        }
        debug!(id = ?merged.inner.id, sources = containers.len(), "Containers merged");
        merged
    }
}

impl Container {
    /// Adds a new binding for `service_id` and returns its builder.
    /// Existing bindings for the identifier are kept.
    pub fn bind(&self, service_id: impl Into<ServiceId>) -> BindingBuilder {
        self.bind_in_module(service_id.into(), None)
    }

    pub(crate) fn bind_in_module(&self, service_id: ServiceId, module_id: Option<ModuleId>) -> BindingBuilder {
        let binding = Arc::new(Binding::new(service_id, self.inner.options.default_scope, module_id));
        debug!(service_id = %binding.service_id(), ?module_id, "Bound");

        self.inner.state.lock().registry.add(binding.clone());
        BindingBuilder::new(binding)
    }

    /// Removes the bindings of `service_id` if there are any, then binds it again
    ///
    /// # Errors
    /// Same as [`Container::unbind`], except that an unbound identifier is not an error
    pub fn rebind(&self, service_id: impl Into<ServiceId>) -> Result<BindingBuilder, UnbindErrorKind> {
        let service_id = service_id.into();
        self.unbind_if_bound(&service_id)?;
        Ok(self.bind(service_id))
    }

    /// # Errors
    /// Same as [`Container::unbind_async`], except that an unbound identifier is not an error
    pub async fn rebind_async(&self, service_id: impl Into<ServiceId>) -> Result<BindingBuilder, UnbindErrorKind> {
        let service_id = service_id.into();
        if self.is_current_bound(&service_id) {
            self.unbind_async(&service_id).await?;
        }
        Ok(self.bind(service_id))
    }

    pub(crate) fn unbind_if_bound(&self, service_id: &ServiceId) -> Result<(), UnbindErrorKind> {
        if self.is_current_bound(service_id) {
            self.unbind(service_id)
        } else {
            Ok(())
        }
    }

    /// Deactivates the cached values of every binding of `service_id` and removes the bindings.
    ///
    /// Deactivation runs the binding's hooks, then the container hooks from this container up to the root,
    /// then [`Injectable::pre_destroy`].
    ///
    /// # Errors
    /// - Returns [`UnbindErrorKind::NoBinding`] if this container has no bindings for the identifier
    /// - Returns [`UnbindErrorKind::LazySync`] if a cached value is pending or a hook is asynchronous.
    ///   This is checked before any hook runs, and the bindings stay registered.
    ///   Use [`Container::unbind_async`] instead.
    /// - Returns [`UnbindErrorKind::Deactivation`] with every hook failure.
    ///   The bindings are removed anyway.
    pub fn unbind(&self, service_id: impl Into<ServiceId>) -> Result<(), UnbindErrorKind> {
        let service_id = service_id.into();
        let span = info_span!("unbind", %service_id);
        let _guard = span.enter();

        let bindings = self.current_bindings(&service_id)?;
        let errors = self.deactivate(&bindings)?;
        self.remove_service(&service_id);
        deactivation_result(errors)
    }

    /// # Errors
    /// Same as [`Container::unbind`], but pending values and hooks are awaited
    pub async fn unbind_async(&self, service_id: impl Into<ServiceId>) -> Result<(), UnbindErrorKind> {
        let service_id = service_id.into();
        let span = info_span!("unbind_async", %service_id);

        async {
            let bindings = self.current_bindings(&service_id)?;
            let errors = self.deactivate_async(&bindings).await;
            self.remove_bindings(&bindings);
            deactivation_result(errors)
        }
        .instrument(span)
        .await
    }

    /// Unbinds every binding of this container, see [`Container::unbind`]
    ///
    /// # Errors
    /// Same as [`Container::unbind`], except that an empty container is not an error
    pub fn unbind_all(&self) -> Result<(), UnbindErrorKind> {
        let span = info_span!("unbind_all");
        let _guard = span.enter();

        let bindings = self.inner.state.lock().registry.all();
        let errors = self.deactivate(&bindings)?;
        self.remove_bindings(&bindings);
        deactivation_result(errors)
    }

    /// # Errors
    /// Same as [`Container::unbind_all`], but pending values and hooks are awaited
    pub async fn unbind_all_async(&self) -> Result<(), UnbindErrorKind> {
        async {
            let bindings = self.inner.state.lock().registry.all();
            let errors = self.deactivate_async(&bindings).await;
            self.remove_bindings(&bindings);
            deactivation_result(errors)
        }
        .instrument(info_span!("unbind_all_async"))
        .await
    }

    fn current_bindings(&self, service_id: &ServiceId) -> Result<Vec<Arc<Binding>>, UnbindErrorKind> {
        let bindings = self.inner.state.lock().registry.get(service_id).map(<[_]>::to_vec);
        bindings.map_err(|_| {
            let err = UnbindErrorKind::NoBinding {
                service_id: service_id.clone(),
            };
            error!("{}", err);
            err
        })
    }

    /// Removes every binding of `service_id` from this container
    fn remove_service(&self, service_id: &ServiceId) {
        let removed = self.inner.state.lock().registry.remove(service_id);
        for binding in &removed {
            let _ = binding.take_cache();
        }
        debug!(count = removed.len(), "Unbound");
    }

    fn remove_bindings(&self, bindings: &[Arc<Binding>]) {
        let ids: BTreeSet<BindingId> = bindings
            .iter()
            .map(|binding| {
                let _ = binding.take_cache();
                binding.id()
            })
            .collect();
        let removed = self.inner.state.lock().registry.remove_by_condition(|binding| ids.contains(&binding.id()));
        debug!(count = removed.len(), "Unbound");
    }

    fn deactivations(&self, bindings: &[Arc<Binding>]) -> Vec<Deactivation> {
        bindings
            .iter()
            .filter_map(|binding| {
                let instance = binding.lookup_cache()?;
                let config = binding.config();

                let mut hooks = config.on_deactivation;
                hooks.extend(self.deactivation_hooks(binding.service_id()));
                if let Some(Implementation::Instance(Constructor { destroy: Some(destroy), .. })) = config.implementation {
                    hooks.push(destroy);
                }

                Some(Deactivation {
                    service_id: binding.service_id().clone(),
                    instance,
                    hooks,
                })
            })
            .collect()
    }

    /// Deactivations of `bindings` with their cached values, prepared without running any hook
    ///
    /// # Errors
    /// Returns [`UnbindErrorKind::LazySync`] if a cached value is pending or a hook is asynchronous
    fn sync_deactivations(&self, bindings: &[Arc<Binding>]) -> Result<Vec<(ServiceId, Instance, Vec<BoxedDeactivation>)>, UnbindErrorKind> {
        let lazy_sync = |service_id: ServiceId| {
            let err = UnbindErrorKind::LazySync { service_id };
            error!("{}", err);
            err
        };

        if let Some(binding) = bindings.iter().find(|binding| binding.cache_status() == CacheStatus::Pending) {
            return Err(lazy_sync(binding.service_id().clone()));
        }

        self.deactivations(bindings)
            .into_iter()
            .map(
                |Deactivation {
                     service_id,
                     instance,
                     hooks,
                 }| {
                    if hooks.iter().any(BoxedDeactivation::is_async) {
                        return Err(lazy_sync(service_id));
                    }
                    match instance.try_ready() {
                        Ok(instance) => Ok((service_id, instance, hooks)),
                        Err(_) => Err(lazy_sync(service_id)),
                    }
                },
            )
            .collect()
    }

    fn deactivate(&self, bindings: &[Arc<Binding>]) -> Result<Vec<DeactivateError>, UnbindErrorKind> {
        let deactivations = self.sync_deactivations(bindings)?;

        let mut errors = Vec::new();
        for (service_id, instance, hooks) in deactivations {
            for mut hook in hooks {
                let result = match hook.call(instance.clone()) {
                    Ok(MaybeAsync::Ready(())) => Ok(()),
                    Ok(MaybeAsync::Pending(_)) => Err(InstantiateErrorKind::Custom(anyhow::anyhow!(
                        "Deactivation hook flagged as synchronous returned a pending result"
                    ))),
                    Err(err) => Err(err),
                };
                match result {
                    Ok(()) => debug!(%service_id, "Deactivation hook called"),
                    Err(source) => {
                        errors.push(DeactivateError { service_id, source });
                        break;
                    }
                }
            }
        }
        Ok(errors)
    }

    async fn deactivate_async(&self, bindings: &[Arc<Binding>]) -> Vec<DeactivateError> {
        let mut errors = Vec::new();
        for Deactivation {
            service_id,
            instance,
            hooks,
        } in self.deactivations(bindings)
        {
            let instance = match instance.await {
                Ok(instance) => instance,
                Err(err) => {
                    debug!(%service_id, %err, "Cached value failed, nothing to deactivate");
                    continue;
                }
            };
            for mut hook in hooks {
                let result = match hook.call(instance.clone()) {
                    Ok(value) => value.await,
                    Err(err) => Err(err),
                };
                match result {
                    Ok(()) => debug!(%service_id, "Deactivation hook called"),
                    Err(source) => {
                        errors.push(DeactivateError { service_id, source });
                        break;
                    }
                }
            }
        }
        errors
    }
}

fn deactivation_result(errors: Vec<DeactivateError>) -> Result<(), UnbindErrorKind> {
    if errors.is_empty() {
        return Ok(());
    }
    let err = UnbindErrorKind::Deactivation(errors);
    error!("{}", err);
    Err(err)
}

impl Container {
    /// Checks this container, then its ancestors
    #[must_use]
    pub fn is_bound(&self, service_id: impl Into<ServiceId>) -> bool {
        self.find_bindings(&service_id.into()).is_some()
    }

    /// Checks this container only
    #[must_use]
    pub fn is_current_bound(&self, service_id: impl Into<ServiceId>) -> bool {
        self.inner.state.lock().registry.has(&service_id.into())
    }

    /// Checks whether a binding constrained to `name` exists in this container or its ancestors
    #[must_use]
    pub fn is_bound_named(&self, service_id: impl Into<ServiceId>, name: &'static str) -> bool {
        self.is_bound_with(&service_id.into(), &[Tag::named(name)])
    }

    #[must_use]
    pub fn is_bound_tagged(&self, service_id: impl Into<ServiceId>, key: &'static str, value: &'static str) -> bool {
        self.is_bound_with(&service_id.into(), &[Tag::new(key, value)])
    }

    fn is_bound_with(&self, service_id: &ServiceId, tags: &[Tag]) -> bool {
        let local = self.inner.state.lock().registry.get(service_id).map(<[_]>::to_vec).unwrap_or_default();
        let target = ConstraintTarget {
            service_id,
            tags,
            ancestors: &[],
        };
        if local.iter().any(|binding| binding.matches(&target)) {
            return true;
        }
        self.inner.parent.as_ref().is_some_and(|parent| parent.is_bound_with(service_id, tags))
    }

    /// Bindings of the nearest container in the chain that has any
    fn find_bindings(&self, service_id: &ServiceId) -> Option<Vec<Arc<Binding>>> {
        let local = self.inner.state.lock().registry.get(service_id).ok().map(<[_]>::to_vec);
        local.or_else(|| self.inner.parent.as_ref().and_then(|parent| parent.find_bindings(service_id)))
    }

    /// Candidate bindings for planning. A class identifier bound nowhere is bound to itself here
    /// if the container is configured to do so.
    pub(crate) fn lookup_bindings(&self, service_id: &ServiceId) -> Vec<Arc<Binding>> {
        if let Some(bindings) = self.find_bindings(service_id) {
            return bindings;
        }

        match service_id.as_class() {
            Some(class) if self.inner.options.auto_bind_on_miss => {
                debug!(%service_id, "Auto-bound to itself");
                match self.bind(service_id.clone()).to_class(*class) {
                    Ok(builder) => vec![builder.binding().clone()],
                    Err(_) => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }
}

impl Container {
    /// Adds a hook for every value of `service_id` resolved through this container or its children.
    /// Container hooks run after the binding's own hooks, ancestors' hooks first.
    pub fn on_activation<T, F, E>(&self, service_id: impl Into<ServiceId>, activation: F)
    where
        T: Send + Sync + 'static,
        F: FnMut(&Context, Arc<T>) -> Result<Arc<T>, E> + Clone + Send + Sync + 'static,
        E: Into<InstantiateErrorKind>,
    {
        self.add_activation(service_id.into(), boxed_activation(activation), None);
    }

    pub fn on_activation_async<T, F, Fut, E>(&self, service_id: impl Into<ServiceId>, activation: F)
    where
        T: Send + Sync + 'static,
        F: FnMut(Context, Arc<T>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, E>> + Send + 'static,
        E: Into<InstantiateErrorKind> + 'static,
    {
        self.add_activation(service_id.into(), boxed_async_activation(activation), None);
    }

    /// Adds a hook that runs when a cached value of `service_id` is unbound from this container or its children
    pub fn on_deactivation<T, F, E>(&self, service_id: impl Into<ServiceId>, deactivation: F)
    where
        T: Send + Sync + 'static,
        F: FnMut(Arc<T>) -> Result<(), E> + Clone + Send + Sync + 'static,
        E: Into<InstantiateErrorKind>,
    {
        self.add_deactivation(service_id.into(), boxed_deactivation(deactivation), None);
    }

    pub fn on_deactivation_async<T, F, Fut, E>(&self, service_id: impl Into<ServiceId>, deactivation: F)
    where
        T: Send + Sync + 'static,
        F: FnMut(Arc<T>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<InstantiateErrorKind> + 'static,
    {
        self.add_deactivation(service_id.into(), boxed_async_deactivation(deactivation), None);
    }

    pub(crate) fn add_activation(&self, service_id: ServiceId, hook: BoxedActivation, module_id: Option<ModuleId>) {
        let mut state = self.inner.state.lock();
        let hook_id = state.activations.add(service_id.clone(), hook);
        if let Some(module_id) = module_id {
            state.module_store.add_activation(module_id, service_id, hook_id);
        }
    }

    pub(crate) fn add_deactivation(&self, service_id: ServiceId, hook: BoxedDeactivation, module_id: Option<ModuleId>) {
        let mut state = self.inner.state.lock();
        let hook_id = state.deactivations.add(service_id.clone(), hook);
        if let Some(module_id) = module_id {
            state.module_store.add_deactivation(module_id, service_id, hook_id);
        }
    }

    /// Container activation hooks, from the root down to this container
    pub(crate) fn activation_hooks(&self, service_id: &ServiceId) -> Vec<BoxedActivation> {
        let mut hooks = self
            .inner
            .parent
            .as_ref()
            .map(|parent| parent.activation_hooks(service_id))
            .unwrap_or_default();
        hooks.extend(self.inner.state.lock().activations.get(service_id));
        hooks
    }

    /// Container deactivation hooks, from this container up to the root
    pub(crate) fn deactivation_hooks(&self, service_id: &ServiceId) -> Vec<BoxedDeactivation> {
        let mut hooks = self.inner.state.lock().deactivations.get(service_id);
        if let Some(parent) = &self.inner.parent {
            hooks.extend(parent.deactivation_hooks(service_id));
        }
        hooks
    }
}

impl Container {
    /// Runs the registration of every module, in order.
    /// If a registration fails, whatever that module registered is discarded and loading stops.
    /// Bindings the failing module unbound or rebound before failing are not brought back,
    /// and modules loaded before it stay loaded.
    ///
    /// # Errors
    /// Returns the error of the failed registration
    pub fn load(&self, modules: &[&ContainerModule]) -> Result<(), ContainerErrorKind> {
        for module in modules {
            let span = info_span!("load", module = ?module.id());
            let _guard = span.enter();

            let binder = ModuleBinder::new(self.clone(), module.id());
            if let Err(err) = module.register(&binder) {
                error!("{}", err);
                self.discard_module(module.id());
                return Err(err);
            }
            debug!("Module loaded");
        }
        Ok(())
    }

    /// # Errors
    /// Same as [`Container::load`]
    pub async fn load_async(&self, modules: &[&AsyncContainerModule]) -> Result<(), ContainerErrorKind> {
        for module in modules {
            let span = info_span!("load_async", module = ?module.id());

            let binder = ModuleBinder::new(self.clone(), module.id());
            if let Err(err) = module.register(binder).instrument(span.clone()).await {
                span.in_scope(|| error!("{}", err));
                self.discard_module(module.id());
                return Err(err);
            }
            span.in_scope(|| debug!("Module loaded"));
        }
        Ok(())
    }

    /// Unbinds exactly the bindings and hooks the modules registered, deactivating cached values first
    ///
    /// # Errors
    /// - Returns [`UnbindErrorKind::LazySync`] if a cached value of any of the modules is pending or a hook is asynchronous.
    ///   Nothing is unloaded then, see [`Container::unbind`]
    /// - Returns [`UnbindErrorKind::Deactivation`] with the hook failures of every module
    pub fn unload(&self, module_ids: &[ModuleId]) -> Result<(), UnbindErrorKind> {
        for module_id in module_ids {
            self.sync_deactivations(&self.module_bindings(*module_id))?;
        }

        let mut errors = Vec::new();
        for module_id in module_ids {
            let span = info_span!("unload", module = ?module_id);
            let _guard = span.enter();

            let bindings = self.module_bindings(*module_id);
            errors.extend(self.deactivate(&bindings)?);
            self.remove_bindings(&bindings);
            self.forget_module_hooks(*module_id);
            debug!("Module unloaded");
        }
        deactivation_result(errors)
    }

    /// # Errors
    /// Same as [`Container::unload`], but pending values and hooks are awaited
    pub async fn unload_async(&self, module_ids: &[ModuleId]) -> Result<(), UnbindErrorKind> {
        let mut errors = Vec::new();
        for module_id in module_ids {
            let span = info_span!("unload_async", module = ?module_id);
            async {
                let bindings = self.module_bindings(*module_id);
                errors.extend(self.deactivate_async(&bindings).await);
                self.remove_bindings(&bindings);
                self.forget_module_hooks(*module_id);
                debug!("Module unloaded");
            }
            .instrument(span)
            .await;
        }
        deactivation_result(errors)
    }

    fn module_bindings(&self, module_id: ModuleId) -> Vec<Arc<Binding>> {
        let bindings = self.inner.state.lock().registry.all();
        bindings
            .into_iter()
            .filter(|binding| binding.module_id() == Some(module_id))
            .collect()
    }

    fn forget_module_hooks(&self, module_id: ModuleId) {
        let mut state = self.inner.state.lock();
        let hooks = state.module_store.remove(module_id);
        for (service_id, hook_id) in hooks.activations {
            state.activations.remove(&service_id, hook_id);
        }
        for (service_id, hook_id) in hooks.deactivations {
            state.deactivations.remove(&service_id, hook_id);
        }
    }

    /// Drops a partially registered module without deactivating anything
    fn discard_module(&self, module_id: ModuleId) {
        let removed = self
            .inner
            .state
            .lock()
            .registry
            .remove_by_condition(|binding| binding.module_id() == Some(module_id));
        self.forget_module_hooks(module_id);
        debug!(?module_id, bindings = removed.len(), "Module discarded");
    }
}

impl Container {
    /// Saves the bindings, hooks, modules and middleware of this container
    pub fn snapshot(&self) {
        let snapshot = self.inner.state.lock().duplicate();
        let mut snapshots = self.inner.snapshots.lock();
        snapshots.push(snapshot);
        debug!(depth = snapshots.len(), "Snapshot taken");
    }

    /// Replaces the state of this container with the latest snapshot, removing it from the stack
    ///
    /// # Errors
    /// Returns [`ContainerErrorKind::NoSnapshot`] if no snapshot was taken
    pub fn restore(&self) -> Result<(), ContainerErrorKind> {
        let Some(snapshot) = self.inner.snapshots.lock().pop() else {
            let err = ContainerErrorKind::NoSnapshot;
            error!("{}", err);
            return Err(err);
        };
        *self.inner.state.lock() = snapshot;
        debug!("Snapshot restored");
        Ok(())
    }

    /// Wraps resolution of this container in `layer`.
    /// The layer applied last is called first.
    pub fn apply_middleware<L>(&self, layer: L)
    where
        L: Layer<Next>,
        L::Service: Service<ResolveArgs, Response = MaybeAsync<Injected>, Error = ResolveErrorKind> + Clone + Send + Sync + 'static,
    {
        let next = self.inner.state.lock().middleware.take().unwrap_or_else(middleware::base);
        let service = BoxCloneService::new(layer.layer(next));
        self.inner.state.lock().middleware = Some(service);
        debug!("Middleware applied");
    }

    /// Builds the resolution plan of `args` without resolving it
    ///
    /// # Errors
    /// Returns the [`ResolveErrorKind`] planning failed with
    pub fn plan(&self, args: &ResolveArgs) -> Result<Plan, ResolveErrorKind> {
        planner::plan(self, args)
    }

    pub(crate) fn plan_and_resolve(&self, args: &ResolveArgs) -> Result<MaybeAsync<Injected>, ResolveErrorKind> {
        let plan = planner::plan(self, args)?;
        resolver::resolve(self, &plan)
    }

    fn dispatch(&self, args: ResolveArgs) -> Result<MaybeAsync<Injected>, ResolveErrorKind> {
        let middleware = self.inner.state.lock().middleware.clone();
        let result = match middleware {
            Some(mut next) => next.call(args),
            None => self.plan_and_resolve(&args),
        };
        result.map_err(|err| {
            error!("{}", err);
            err
        })
    }

    fn args(&self, service_id: ServiceId, tags: Vec<Tag>) -> ResolveArgs {
        ResolveArgs {
            tags,
            ..ResolveArgs::new(self.clone(), service_id)
        }
    }

    fn resolve_sync<R>(
        &self,
        method: &'static str,
        args: ResolveArgs,
        extract: impl FnOnce(Injected, &ServiceId) -> Result<R, ResolveErrorKind>,
    ) -> Result<R, ResolveErrorKind> {
        let service_id = args.service_id.clone();
        let span = info_span!("get", method, %service_id);
        let _guard = span.enter();

        let injected = match self.dispatch(args)?.try_ready() {
            Ok(injected) => injected,
            Err(_) => {
                let err = ResolveErrorKind::LazySync { service_id };
                error!("{}", err);
                return Err(err);
            }
        };
        extract(injected, &service_id).map_err(|err| {
            error!("{}", err);
            err
        })
    }

    /// Plans and starts resolution now, so concurrent requests share pending singletons from the first poll on
    fn resolve_pending<R, F>(
        &self,
        method: &'static str,
        args: ResolveArgs,
        extract: F,
    ) -> impl Future<Output = Result<R, ResolveErrorKind>> + Send + 'static
    where
        R: Send + 'static,
        F: FnOnce(Injected, &ServiceId) -> Result<R, ResolveErrorKind> + Send + 'static,
    {
        let service_id = args.service_id.clone();
        let span = info_span!("get", method, %service_id);
        let started = span.in_scope(|| self.dispatch(args));

        async move {
            let injected = started?.await.and_then(|injected| extract(injected, &service_id));
            injected.map_err(|err| {
                error!("{}", err);
                err
            })
        }
        .instrument(span)
    }
}

fn single<T: Send + Sync + 'static>(injected: Injected, service_id: &ServiceId) -> Result<Arc<T>, ResolveErrorKind> {
    downcast(injected.into_single(service_id)?, service_id)
}

fn optional<T: Send + Sync + 'static>(injected: Injected, service_id: &ServiceId) -> Result<Option<Arc<T>>, ResolveErrorKind> {
    match injected {
        Injected::Absent => Ok(None),
        injected => single(injected, service_id).map(Some),
    }
}

fn many<T: Send + Sync + 'static>(injected: Injected, service_id: &ServiceId) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
    injected
        .into_many()
        .into_iter()
        .map(|instance| downcast(instance, service_id))
        .collect()
}

/// Synchronous getters.
///
/// # Errors
/// - [`ResolveErrorKind::NoBinding`] if nothing matches and the getter isn't a `try_*` one
/// - [`ResolveErrorKind::Ambiguous`] if a single value is requested and more than one binding matches
/// - [`ResolveErrorKind::CircularDependency`] if the dependency graph has a cycle
/// - [`ResolveErrorKind::LazySync`] if anything in the dependency chain is pending, use the `*_async` getter instead
/// - [`ResolveErrorKind::IncorrectType`] if the value isn't a `T`
impl Container {
    #[allow(clippy::missing_errors_doc)]
    pub fn get<T: Send + Sync + 'static>(&self, service_id: impl Into<ServiceId>) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_sync("get", self.args(service_id.into(), Vec::new()), single::<T>)
    }

    /// Returns `None` instead of failing if nothing matches
    #[allow(clippy::missing_errors_doc)]
    pub fn try_get<T: Send + Sync + 'static>(&self, service_id: impl Into<ServiceId>) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let args = ResolveArgs {
            optional: true,
            ..self.args(service_id.into(), Vec::new())
        };
        self.resolve_sync("try_get", args, optional::<T>)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_named<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        name: &'static str,
    ) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_sync("get_named", self.args(service_id.into(), vec![Tag::named(name)]), single::<T>)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn try_get_named<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        name: &'static str,
    ) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let args = ResolveArgs {
            optional: true,
            ..self.args(service_id.into(), vec![Tag::named(name)])
        };
        self.resolve_sync("try_get_named", args, optional::<T>)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_tagged<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        key: &'static str,
        value: &'static str,
    ) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_sync("get_tagged", self.args(service_id.into(), vec![Tag::new(key, value)]), single::<T>)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn try_get_tagged<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        key: &'static str,
        value: &'static str,
    ) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let args = ResolveArgs {
            optional: true,
            ..self.args(service_id.into(), vec![Tag::new(key, value)])
        };
        self.resolve_sync("try_get_tagged", args, optional::<T>)
    }

    /// Values of every binding of `service_id` in registration order, constraints ignored
    #[allow(clippy::missing_errors_doc)]
    pub fn get_all<T: Send + Sync + 'static>(&self, service_id: impl Into<ServiceId>) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        self.get_all_with(service_id, GetAllOptions::default())
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_all_with<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        options: GetAllOptions,
    ) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let args = ResolveArgs {
            multi: true,
            avoid_constraints: !options.enforce_constraints,
            ..self.args(service_id.into(), Vec::new())
        };
        self.resolve_sync("get_all", args, many::<T>)
    }

    /// Returns an empty list instead of failing if the identifier is bound nowhere
    #[allow(clippy::missing_errors_doc)]
    pub fn try_get_all<T: Send + Sync + 'static>(&self, service_id: impl Into<ServiceId>) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let args = ResolveArgs {
            multi: true,
            optional: true,
            avoid_constraints: true,
            ..self.args(service_id.into(), Vec::new())
        };
        self.resolve_sync("try_get_all", args, many::<T>)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_all_named<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        name: &'static str,
    ) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let args = ResolveArgs {
            multi: true,
            ..self.args(service_id.into(), vec![Tag::named(name)])
        };
        self.resolve_sync("get_all_named", args, many::<T>)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn try_get_all_named<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        name: &'static str,
    ) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let args = ResolveArgs {
            multi: true,
            optional: true,
            ..self.args(service_id.into(), vec![Tag::named(name)])
        };
        self.resolve_sync("try_get_all_named", args, many::<T>)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_all_tagged<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        key: &'static str,
        value: &'static str,
    ) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let args = ResolveArgs {
            multi: true,
            ..self.args(service_id.into(), vec![Tag::new(key, value)])
        };
        self.resolve_sync("get_all_tagged", args, many::<T>)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn try_get_all_tagged<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        key: &'static str,
        value: &'static str,
    ) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let args = ResolveArgs {
            multi: true,
            optional: true,
            ..self.args(service_id.into(), vec![Tag::new(key, value)])
        };
        self.resolve_sync("try_get_all_tagged", args, many::<T>)
    }
}

/// Asynchronous getters.
///
/// Planning happens when the getter is called and fails the returned future, not the call.
/// Pending values in the dependency chain are awaited, sibling dependencies together.
impl Container {
    pub fn get_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
    ) -> impl Future<Output = Result<Arc<T>, ResolveErrorKind>> + Send + 'static {
        self.resolve_pending("get_async", self.args(service_id.into(), Vec::new()), single::<T>)
    }

    pub fn try_get_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
    ) -> impl Future<Output = Result<Option<Arc<T>>, ResolveErrorKind>> + Send + 'static {
        let args = ResolveArgs {
            optional: true,
            ..self.args(service_id.into(), Vec::new())
        };
        self.resolve_pending("try_get_async", args, optional::<T>)
    }

    pub fn get_named_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        name: &'static str,
    ) -> impl Future<Output = Result<Arc<T>, ResolveErrorKind>> + Send + 'static {
        self.resolve_pending("get_named_async", self.args(service_id.into(), vec![Tag::named(name)]), single::<T>)
    }

    pub fn try_get_named_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        name: &'static str,
    ) -> impl Future<Output = Result<Option<Arc<T>>, ResolveErrorKind>> + Send + 'static {
        let args = ResolveArgs {
            optional: true,
            ..self.args(service_id.into(), vec![Tag::named(name)])
        };
        self.resolve_pending("try_get_named_async", args, optional::<T>)
    }

    pub fn get_tagged_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        key: &'static str,
        value: &'static str,
    ) -> impl Future<Output = Result<Arc<T>, ResolveErrorKind>> + Send + 'static {
        self.resolve_pending("get_tagged_async", self.args(service_id.into(), vec![Tag::new(key, value)]), single::<T>)
    }

    pub fn try_get_tagged_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        key: &'static str,
        value: &'static str,
    ) -> impl Future<Output = Result<Option<Arc<T>>, ResolveErrorKind>> + Send + 'static {
        let args = ResolveArgs {
            optional: true,
            ..self.args(service_id.into(), vec![Tag::new(key, value)])
        };
        self.resolve_pending("try_get_tagged_async", args, optional::<T>)
    }

    pub fn get_all_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
    ) -> impl Future<Output = Result<Vec<Arc<T>>, ResolveErrorKind>> + Send + 'static {
        self.get_all_with_async(service_id, GetAllOptions::default())
    }

    pub fn get_all_with_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        options: GetAllOptions,
    ) -> impl Future<Output = Result<Vec<Arc<T>>, ResolveErrorKind>> + Send + 'static {
        let args = ResolveArgs {
            multi: true,
            avoid_constraints: !options.enforce_constraints,
            ..self.args(service_id.into(), Vec::new())
        };
        self.resolve_pending("get_all_async", args, many::<T>)
    }

    pub fn try_get_all_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
    ) -> impl Future<Output = Result<Vec<Arc<T>>, ResolveErrorKind>> + Send + 'static {
        let args = ResolveArgs {
            multi: true,
            optional: true,
            avoid_constraints: true,
            ..self.args(service_id.into(), Vec::new())
        };
        self.resolve_pending("try_get_all_async", args, many::<T>)
    }

    pub fn get_all_named_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        name: &'static str,
    ) -> impl Future<Output = Result<Vec<Arc<T>>, ResolveErrorKind>> + Send + 'static {
        let args = ResolveArgs {
            multi: true,
            ..self.args(service_id.into(), vec![Tag::named(name)])
        };
        self.resolve_pending("get_all_named_async", args, many::<T>)
    }

    pub fn try_get_all_named_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        name: &'static str,
    ) -> impl Future<Output = Result<Vec<Arc<T>>, ResolveErrorKind>> + Send + 'static {
        let args = ResolveArgs {
            multi: true,
            optional: true,
            ..self.args(service_id.into(), vec![Tag::named(name)])
        };
        self.resolve_pending("try_get_all_named_async", args, many::<T>)
    }

    pub fn get_all_tagged_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        key: &'static str,
        value: &'static str,
    ) -> impl Future<Output = Result<Vec<Arc<T>>, ResolveErrorKind>> + Send + 'static {
        let args = ResolveArgs {
            multi: true,
            ..self.args(service_id.into(), vec![Tag::new(key, value)])
        };
        self.resolve_pending("get_all_tagged_async", args, many::<T>)
    }

    pub fn try_get_all_tagged_async<T: Send + Sync + 'static>(
        &self,
        service_id: impl Into<ServiceId>,
        key: &'static str,
        value: &'static str,
    ) -> impl Future<Output = Result<Vec<Arc<T>>, ResolveErrorKind>> + Send + 'static {
        let args = ResolveArgs {
            multi: true,
            optional: true,
            ..self.args(service_id.into(), vec![Tag::new(key, value)])
        };
        self.resolve_pending("try_get_all_tagged_async", args, many::<T>)
    }
}

impl Container {
    /// Resolves `T` through a temporary child container that binds the class to itself,
    /// so `T` is built even if it isn't bound, and no binding is left behind
    ///
    /// # Errors
    /// Returns [`ContainerErrorKind::Resolve`] if `T` or one of its dependencies can't be resolved
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>, ContainerErrorKind> {
        let child = self.class_scope::<T>()?;
        Ok(child.get(ServiceId::class::<T>())?)
    }

    pub fn resolve_async<T: Injectable>(&self) -> impl Future<Output = Result<Arc<T>, ContainerErrorKind>> + Send + 'static {
        let started = self.class_scope::<T>().map(|child| {
            let value = child.get_async::<T>(ServiceId::class::<T>());
            (child, value)
        });

        async move {
            let (_child, value) = started?;
            Ok(value.await?)
        }
    }

    fn class_scope<T: Injectable>(&self) -> Result<Container, ContainerErrorKind> {
        let child = self.create_child();
        child.bind(ServiceId::class::<T>()).to_self()?;
        Ok(child)
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("options", &self.inner.options)
            .field("parent", &self.inner.parent.as_ref().map(Container::id))
            .finish_non_exhaustive()
    }
}
