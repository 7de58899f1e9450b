use std::sync::Arc;
use tracing::debug;

use crate::{
    binding::{Binding, BindingConfig, Implementation},
    cache::CacheStatus,
    constraint::ConstraintTarget,
    container::Container,
    dependency::Target,
    errors::ResolveErrorKind,
    hooks::BoxedActivation,
    middleware::ResolveArgs,
    scope::BindingScope,
    service_id::{ServiceId, Tag},
};

/// Resolution tree built for one top-level request
pub struct Plan {
    pub(crate) root: Request,
}

impl Plan {
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Request {
        &self.root
    }
}

/// One requested identifier together with the bindings selected for it
pub struct Request {
    pub(crate) service_id: ServiceId,
    pub(crate) tags: Vec<Tag>,
    pub(crate) multi: bool,
    pub(crate) optional: bool,
    pub(crate) bindings: Vec<BindingPlan>,
}

impl Request {
    #[inline]
    #[must_use]
    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    #[inline]
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    #[inline]
    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    #[inline]
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &[BindingPlan] {
        &self.bindings
    }
}

/// A selected binding and the requests for its dependencies
pub struct BindingPlan {
    pub(crate) binding: Arc<Binding>,
    pub(crate) scope: BindingScope,
    pub(crate) implementation: Implementation,
    pub(crate) activations: Vec<BoxedActivation>,
    pub(crate) children: Vec<(Target, Request)>,
}

impl BindingPlan {
    #[inline]
    #[must_use]
    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> BindingScope {
        self.scope
    }

    /// Dependency requests, empty for kinds without dependencies and for singletons that are already resolved
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[(Target, Request)] {
        &self.children
    }
}

struct Planner<'a> {
    container: &'a Container,
    /// Identifiers of the current branch, from the root down
    ancestors: Vec<ServiceId>,
}

/// Builds the plan for `args` against `container`, searching parent containers for bindings the container doesn't have
pub(crate) fn plan(container: &Container, args: &ResolveArgs) -> Result<Plan, ResolveErrorKind> {
    let mut planner = Planner {
        container,
        ancestors: Vec::new(),
    };
    let root = planner.plan_request(
        args.service_id.clone(),
        args.tags.clone(),
        args.multi,
        args.optional,
        args.avoid_constraints,
    )?;
    Ok(Plan { root })
}

impl Planner<'_> {
    fn plan_request(
        &mut self,
        service_id: ServiceId,
        tags: Vec<Tag>,
        multi: bool,
        optional: bool,
        avoid_constraints: bool,
    ) -> Result<Request, ResolveErrorKind> {
        let candidates = self.container.lookup_bindings(&service_id);

        let matching: Vec<Arc<Binding>> = if avoid_constraints {
            candidates.clone()
        } else {
            let target = ConstraintTarget {
                service_id: &service_id,
                tags: &tags,
                ancestors: &self.ancestors,
            };
            candidates.iter().filter(|binding| binding.matches(&target)).cloned().collect()
        };

        debug!(
            service_id = %service_id,
            candidates = candidates.len(),
            matching = matching.len(),
            "Bindings selected"
        );

        if multi {
            if candidates.is_empty() && !optional {
                return Err(ResolveErrorKind::NoBinding { service_id });
            }
        } else {
            match matching.len() {
                0 if optional => {}
                0 => return Err(ResolveErrorKind::NoBinding { service_id }),
                1 => {}
                count => return Err(ResolveErrorKind::Ambiguous { service_id, count }),
            }
        }

        let mut bindings = Vec::with_capacity(matching.len());
        for binding in matching {
            bindings.push(self.plan_binding(binding, &service_id)?);
        }

        Ok(Request {
            service_id,
            tags,
            multi,
            optional,
            bindings,
        })
    }

    fn plan_binding(&mut self, binding: Arc<Binding>, service_id: &ServiceId) -> Result<BindingPlan, ResolveErrorKind> {
        let BindingConfig {
            scope,
            implementation,
            on_activation,
            ..
        } = binding.config();
        let Some(implementation) = implementation else {
            return Err(ResolveErrorKind::MissingImplementation {
                service_id: service_id.clone(),
            });
        };

        let mut children = Vec::new();
        match &implementation {
            Implementation::Instance(constructor) => {
                if scope == BindingScope::Singleton && binding.cache_status() == CacheStatus::Resolved {
                    debug!(service_id = %service_id, "Already resolved, dependencies not planned");
                } else {
                    debug!(
                        service_id = %service_id,
                        implementation = %constructor.type_info,
                        dependencies = constructor.dependencies.len(),
                        "Planning dependencies"
                    );
                    self.ancestors.push(service_id.clone());
                    for dependency in constructor.dependencies.iter() {
                        self.check_cycle(&dependency.service_id)?;
                        let request = self.plan_request(
                            dependency.service_id.clone(),
                            dependency.tags.clone(),
                            dependency.multi,
                            dependency.optional,
                            false,
                        )?;
                        children.push((dependency.target, request));
                    }
                    self.ancestors.pop();
                }
            }
            Implementation::DelegateToService(target) => {
                self.ancestors.push(service_id.clone());
                self.check_cycle(target)?;
                let request = self.plan_request(target.clone(), Vec::new(), false, false, false)?;
                children.push((Target::Constructor, request));
                self.ancestors.pop();
            }
            _ => {}
        }

        let mut activations = on_activation;
        activations.extend(self.container.activation_hooks(service_id));

        Ok(BindingPlan {
            binding,
            scope,
            implementation,
            activations,
            children,
        })
    }

    fn check_cycle(&self, service_id: &ServiceId) -> Result<(), ResolveErrorKind> {
        if self.ancestors.contains(service_id) {
            let mut path = self.ancestors.clone();
            path.push(service_id.clone());
            return Err(ResolveErrorKind::CircularDependency { path });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::plan;
    use crate::{
        container::Container, errors::ResolveErrorKind, inject::Inject, middleware::ResolveArgs, service_id::ServiceId, Arguments,
        Dependency, InstantiateErrorKind,
    };

    use std::sync::Arc;

    struct Ninja;
    struct Katana;

    fn args(container: &Container, service_id: ServiceId) -> ResolveArgs {
        ResolveArgs::new(container.clone(), service_id)
    }

    #[test]
    fn test_plan_tree() {
        let container = Container::new();
        container
            .bind(ServiceId::of::<Katana>())
            .to_instantiator(|| Ok::<_, InstantiateErrorKind>(Katana))
            .unwrap();
        container
            .bind(ServiceId::of::<Ninja>())
            .to_instantiator(|Inject(_): Inject<Katana>| Ok::<_, InstantiateErrorKind>(Ninja))
            .unwrap();

        let plan = plan(&container, &args(&container, ServiceId::of::<Ninja>())).unwrap();
        let root = plan.root();

        assert_eq!(root.service_id(), &ServiceId::of::<Ninja>());
        assert_eq!(root.bindings().len(), 1);

        let children = root.bindings()[0].children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].1.service_id(), &ServiceId::of::<Katana>());
        assert!(children[0].1.bindings()[0].children().is_empty());
    }

    #[test]
    fn test_cycle() {
        struct A;
        struct B;

        let container = Container::new();
        container
            .bind(ServiceId::of::<A>())
            .to_instantiator(|Inject(_): Inject<B>| Ok::<_, InstantiateErrorKind>(A))
            .unwrap();
        container
            .bind(ServiceId::of::<B>())
            .to_instantiator(|Inject(_): Inject<A>| Ok::<_, InstantiateErrorKind>(B))
            .unwrap();

        let result = plan(&container, &args(&container, ServiceId::of::<A>()));

        assert!(matches!(
            result,
            Err(ResolveErrorKind::CircularDependency { path }) if path == [ServiceId::of::<A>(), ServiceId::of::<B>(), ServiceId::of::<A>()]
        ));
    }

    #[test]
    fn test_delegate_cycle() {
        let container = Container::new();
        container.bind("A").to_service("B").unwrap();
        container.bind("B").to_service("A").unwrap();

        assert!(matches!(
            plan(&container, &args(&container, ServiceId::name("A"))),
            Err(ResolveErrorKind::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_optional_dependency_absent() {
        let container = Container::new();
        container
            .bind("Ninja")
            .to_instantiator(|| Ok::<_, InstantiateErrorKind>(Ninja))
            .unwrap();

        let mut request = args(&container, ServiceId::name("Shuriken"));
        request.optional = true;
        let plan = plan(&container, &request).unwrap();

        assert!(plan.root().bindings().is_empty());
        assert!(plan.root().is_optional());
    }

    #[test]
    fn test_ambiguous_and_missing() {
        let container = Container::new();
        container.bind("Weapon").to_constant_value(1u8).unwrap();
        container.bind("Weapon").to_constant_value(2u8).unwrap();

        assert!(matches!(
            plan(&container, &args(&container, ServiceId::name("Weapon"))),
            Err(ResolveErrorKind::Ambiguous { count: 2, .. })
        ));
        assert!(matches!(
            plan(&container, &args(&container, ServiceId::name("Armor"))),
            Err(ResolveErrorKind::NoBinding { .. })
        ));

        let mut all = args(&container, ServiceId::name("Weapon"));
        all.multi = true;
        assert_eq!(plan(&container, &all).unwrap().root().bindings().len(), 2);
    }

    #[test]
    fn test_missing_implementation() {
        let container = Container::new();
        let _ = container.bind("Weapon");

        assert!(matches!(
            plan(&container, &args(&container, ServiceId::name("Weapon"))),
            Err(ResolveErrorKind::MissingImplementation { .. })
        ));
    }

    #[test]
    fn test_parent_fallback() {
        struct Dojo;

        impl crate::Injectable for Dojo {
            fn dependencies() -> Vec<Dependency> {
                vec![Dependency::new("Master")]
            }

            fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
                let _: Arc<u8> = arguments.next()?;
                Ok(Self)
            }
        }

        let parent = Container::new();
        parent.bind("Master").to_constant_value(1u8).unwrap();
        let child = parent.create_child();
        child.bind(ServiceId::class::<Dojo>()).to_self().unwrap();

        let plan = plan(&child, &args(&child, ServiceId::of::<Dojo>())).unwrap();
        let master = &plan.root().bindings()[0].children()[0].1;

        assert_eq!(master.bindings().len(), 1);
        assert!(parent.is_current_bound("Master"));
        assert!(!child.is_current_bound("Master"));
    }
}
