use std::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};
use tracing::debug;

use crate::{
    any::Instance,
    binding::{BindingId, Implementation},
    cache::CacheState,
    container::Container,
    context::Context,
    dependency::{Arguments, Injected},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    hooks::BoxedActivation,
    maybe_async::MaybeAsync,
    planner::{BindingPlan, Plan, Request},
    scope::BindingScope,
    service::Service as _,
    service_id::ServiceId,
};

struct Resolver<'a> {
    container: &'a Container,
    /// Values of request-scoped bindings, shared within this resolution only
    request_cache: BTreeMap<BindingId, CacheState>,
}

/// Executes `plan`, children before parents.
///
/// Values stay ready for as long as every leaf is ready; a single pending leaf makes every ancestor pending,
/// while sibling dependencies are driven together.
pub(crate) fn resolve(container: &Container, plan: &Plan) -> Result<MaybeAsync<Injected>, ResolveErrorKind> {
    let mut resolver = Resolver {
        container,
        request_cache: BTreeMap::new(),
    };
    resolver.resolve_request(&plan.root, None)
}

fn instantiate_error(service_id: &ServiceId) -> impl Fn(InstantiateErrorKind) -> ResolveErrorKind + Clone + Send + Sync + 'static {
    let service_id = service_id.clone();
    move |source| ResolveErrorKind::Instantiate {
        service_id: service_id.clone(),
        source,
    }
}

impl Resolver<'_> {
    fn resolve_request(&mut self, request: &Request, parent: Option<&ServiceId>) -> Result<MaybeAsync<Injected>, ResolveErrorKind> {
        if request.multi {
            let mut values = Vec::with_capacity(request.bindings.len());
            for binding_plan in &request.bindings {
                values.push(self.resolve_binding(binding_plan, &request.service_id, parent)?);
            }
            return Ok(MaybeAsync::join_all(values).map(Injected::Many));
        }

        match request.bindings.first() {
            Some(binding_plan) => Ok(self
                .resolve_binding(binding_plan, &request.service_id, parent)?
                .map(Injected::Single)),
            None => {
                debug!(service_id = %request.service_id, "Optional dependency absent");
                Ok(MaybeAsync::Ready(Injected::Absent))
            }
        }
    }

    fn resolve_binding(
        &mut self,
        binding_plan: &BindingPlan,
        service_id: &ServiceId,
        parent: Option<&ServiceId>,
    ) -> Result<MaybeAsync<Instance>, ResolveErrorKind> {
        match binding_plan.scope {
            BindingScope::Transient => self.construct(binding_plan, service_id, parent),
            BindingScope::Singleton => {
                if let Some(cached) = binding_plan.binding.lookup_cache() {
                    debug!(%service_id, "Found in cache");
                    return Ok(cached);
                }
                debug!(%service_id, "Not found in cache");

                let value = self.construct(binding_plan, service_id, parent)?;
                debug!(%service_id, pending = value.is_pending(), "Cached");
                Ok(binding_plan.binding.store(value))
            }
            BindingScope::Request => {
                let binding_id = binding_plan.binding.id();
                if let Some(cached) = self.request_cache.get_mut(&binding_id).and_then(CacheState::lookup) {
                    debug!(%service_id, "Found in request cache");
                    return Ok(cached);
                }

                let value = self.construct(binding_plan, service_id, parent)?;
                Ok(self.request_cache.entry(binding_id).or_default().store(value, Weak::new()))
            }
        }
    }

    fn construct(
        &mut self,
        binding_plan: &BindingPlan,
        service_id: &ServiceId,
        parent: Option<&ServiceId>,
    ) -> Result<MaybeAsync<Instance>, ResolveErrorKind> {
        let context = Context {
            container: self.container.clone(),
            service_id: service_id.clone(),
            parent: parent.cloned(),
        };
        let to_error = instantiate_error(service_id);

        let value = match &binding_plan.implementation {
            Implementation::Instance(constructor) => {
                let mut arguments = Vec::with_capacity(binding_plan.children.len());
                for (target, child) in &binding_plan.children {
                    let (target, child_id) = (*target, child.service_id.clone());
                    arguments.push(
                        self.resolve_request(child, Some(service_id))?
                            .map(move |injected| (target, child_id, injected)),
                    );
                }

                let mut construct = constructor.construct.clone();
                MaybeAsync::join_all(arguments).and_then(move |arguments| {
                    construct
                        .call(Arguments::new(arguments))
                        .map(MaybeAsync::Ready)
                        .map_err(to_error)
                })?
            }
            Implementation::ConstantValue(value) | Implementation::FunctionValue(value) => MaybeAsync::Ready(value.clone()),
            Implementation::ComputedValue(compute) | Implementation::Factory(compute) | Implementation::Provider(compute) => {
                compute.clone().call(context.clone()).map_err(to_error.clone())?.map_err(to_error)
            }
            Implementation::RawConstructor(class) => MaybeAsync::Ready(Arc::new(*class) as Instance),
            Implementation::DelegateToService(target) => {
                let Some((_, child)) = binding_plan.children.first() else {
                    return Err(ResolveErrorKind::NoBinding {
                        service_id: target.clone(),
                    });
                };
                debug!(%service_id, %target, "Delegated");

                let target = target.clone();
                self.resolve_request(child, Some(service_id))?
                    .and_then(move |injected| injected.into_single(&target).map(MaybeAsync::Ready))?
            }
        };

        activate(value, &binding_plan.activations, &context)
    }
}

/// Runs activation hooks in order, each one on the value the previous one returned
fn activate(
    value: MaybeAsync<Instance>,
    activations: &[BoxedActivation],
    context: &Context,
) -> Result<MaybeAsync<Instance>, ResolveErrorKind> {
    let to_error = instantiate_error(&context.service_id);

    activations.iter().cloned().try_fold(value, |value, mut activation| {
        let (context, to_error) = (context.clone(), to_error.clone());
        value.and_then(move |instance| {
            debug!(service_id = %context.service_id, "Activation hook called");
            match activation.call((context, instance)) {
                Ok(activated) => Ok(activated.map_err(to_error)),
                Err(err) => Err(to_error(err)),
            }
        })
    })
}
