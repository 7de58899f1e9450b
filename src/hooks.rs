use std::{collections::BTreeMap, future::Future, sync::Arc};

use crate::{
    any::{Instance, TypeInfo},
    context::Context,
    errors::InstantiateErrorKind,
    maybe_async::MaybeAsync,
    module::ModuleId,
    service::{service_fn, BoxCloneService, Service as _},
    service_id::ServiceId,
    utils::id::next_id,
};

pub(crate) type BoxedActivation = BoxCloneService<(Context, Instance), MaybeAsync<Instance, InstantiateErrorKind>, InstantiateErrorKind>;
pub(crate) type DeactivationService = BoxCloneService<Instance, MaybeAsync<(), InstantiateErrorKind>, InstantiateErrorKind>;

/// Deactivation hook together with whether it finishes asynchronously.
/// Synchronous unbinding checks the flag before running any hook.
#[derive(Clone)]
pub(crate) struct BoxedDeactivation {
    service: DeactivationService,
    is_async: bool,
}

impl BoxedDeactivation {
    pub(crate) fn new(service: DeactivationService, is_async: bool) -> Self {
        Self { service, is_async }
    }

    #[inline]
    pub(crate) fn is_async(&self) -> bool {
        self.is_async
    }

    #[inline]
    pub(crate) fn call(&mut self, instance: Instance) -> Result<MaybeAsync<(), InstantiateErrorKind>, InstantiateErrorKind> {
        self.service.call(instance)
    }
}

fn typed<T: Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>, InstantiateErrorKind> {
    instance.downcast::<T>().map_err(|_| InstantiateErrorKind::IncorrectType {
        expected: TypeInfo::of::<T>(),
    })
}

#[must_use]
pub(crate) fn boxed_activation<T, F, E>(mut activation: F) -> BoxedActivation
where
    T: Send + Sync + 'static,
    F: FnMut(&Context, Arc<T>) -> Result<Arc<T>, E> + Clone + Send + Sync + 'static,
    E: Into<InstantiateErrorKind>,
{
    BoxCloneService::new(service_fn(
        move |(context, instance): (Context, Instance)| -> Result<MaybeAsync<Instance, InstantiateErrorKind>, InstantiateErrorKind> {
            let activated = activation(&context, typed(instance)?).map_err(Into::into)?;
            Ok(MaybeAsync::Ready(activated as Instance))
        },
    ))
}

#[must_use]
pub(crate) fn boxed_async_activation<T, F, Fut, E>(mut activation: F) -> BoxedActivation
where
    T: Send + Sync + 'static,
    F: FnMut(Context, Arc<T>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<T>, E>> + Send + 'static,
    E: Into<InstantiateErrorKind> + 'static,
{
    BoxCloneService::new(service_fn(
        move |(context, instance): (Context, Instance)| -> Result<MaybeAsync<Instance, InstantiateErrorKind>, InstantiateErrorKind> {
            let future = activation(context, typed(instance)?);
            Ok(MaybeAsync::pending(async move {
                future.await.map(|activated| activated as Instance).map_err(Into::into)
            }))
        },
    ))
}

#[must_use]
pub(crate) fn boxed_deactivation<T, F, E>(mut deactivation: F) -> BoxedDeactivation
where
    T: Send + Sync + 'static,
    F: FnMut(Arc<T>) -> Result<(), E> + Clone + Send + Sync + 'static,
    E: Into<InstantiateErrorKind>,
{
    let service = BoxCloneService::new(service_fn(
        move |instance: Instance| -> Result<MaybeAsync<(), InstantiateErrorKind>, InstantiateErrorKind> {
            deactivation(typed(instance)?).map_err(Into::into)?;
            Ok(MaybeAsync::Ready(()))
        },
    ));
    BoxedDeactivation::new(service, false)
}

#[must_use]
pub(crate) fn boxed_async_deactivation<T, F, Fut, E>(mut deactivation: F) -> BoxedDeactivation
where
    T: Send + Sync + 'static,
    F: FnMut(Arc<T>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<InstantiateErrorKind> + 'static,
{
    let service = BoxCloneService::new(service_fn(
        move |instance: Instance| -> Result<MaybeAsync<(), InstantiateErrorKind>, InstantiateErrorKind> {
            let future = deactivation(typed(instance)?);
            Ok(MaybeAsync::pending(async move { future.await.map_err(Into::into) }))
        },
    ));
    BoxedDeactivation::new(service, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct HookId(u64);

/// Container-level hooks per service identifier, kept in registration order
pub(crate) struct HookTable<H> {
    hooks: BTreeMap<ServiceId, Vec<(HookId, H)>>,
}

impl<H> Default for HookTable<H> {
    fn default() -> Self {
        Self { hooks: BTreeMap::new() }
    }
}

impl<H: Clone> Clone for HookTable<H> {
    fn clone(&self) -> Self {
        Self { hooks: self.hooks.clone() }
    }
}

impl<H: Clone> HookTable<H> {
    pub(crate) fn add(&mut self, service_id: ServiceId, hook: H) -> HookId {
        let hook_id = HookId(next_id());
        self.hooks.entry(service_id).or_default().push((hook_id, hook));
        hook_id
    }

    pub(crate) fn get(&self, service_id: &ServiceId) -> Vec<H> {
        self.hooks
            .get(service_id)
            .map(|hooks| hooks.iter().map(|(_, hook)| hook.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn remove(&mut self, service_id: &ServiceId, hook_id: HookId) {
        if let Some(hooks) = self.hooks.get_mut(service_id) {
            hooks.retain(|(id, _)| *id != hook_id);
            if hooks.is_empty() {
                self.hooks.remove(service_id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }
}

/// Hooks registered by one module, in registration order
#[derive(Default, Clone)]
pub(crate) struct ModuleHooks {
    pub(crate) activations: Vec<(ServiceId, HookId)>,
    pub(crate) deactivations: Vec<(ServiceId, HookId)>,
}

/// Remembers which hooks each loaded module added, so unloading removes exactly those
#[derive(Default, Clone)]
pub(crate) struct ModuleActivationStore {
    modules: BTreeMap<ModuleId, ModuleHooks>,
}

impl ModuleActivationStore {
    pub(crate) fn add_activation(&mut self, module_id: ModuleId, service_id: ServiceId, hook_id: HookId) {
        self.modules.entry(module_id).or_default().activations.push((service_id, hook_id));
    }

    pub(crate) fn add_deactivation(&mut self, module_id: ModuleId, service_id: ServiceId, hook_id: HookId) {
        self.modules.entry(module_id).or_default().deactivations.push((service_id, hook_id));
    }

    pub(crate) fn remove(&mut self, module_id: ModuleId) -> ModuleHooks {
        self.modules.remove(&module_id).unwrap_or_default()
    }
}
