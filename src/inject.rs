use std::{ops::Deref, sync::Arc};

use crate::{
    dependency::{Arguments, Dependency},
    dependency_resolver::DependencyResolver,
    errors::ResolveErrorKind,
};

/// Injects the single value bound to `Dep`
pub struct Inject<Dep>(pub Arc<Dep>);

impl<Dep: Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Dep>()]
    }

    fn resolve(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
        arguments.next().map(Self)
    }
}

impl<Dep> Deref for Inject<Dep> {
    type Target = Dep;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Injects every value bound to `Dep`, in registration order
pub struct InjectAll<Dep>(pub Vec<Arc<Dep>>);

impl<Dep: Send + Sync + 'static> DependencyResolver for InjectAll<Dep> {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Dep>().multi()]
    }

    fn resolve(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
        arguments.next_all().map(Self)
    }
}

/// Injects the value bound to `Dep`, or `None` if nothing matches
pub struct InjectOptional<Dep>(pub Option<Arc<Dep>>);

impl<Dep: Send + Sync + 'static> DependencyResolver for InjectOptional<Dep> {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Dep>().optional()]
    }

    fn resolve(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
        arguments.next_optional().map(Self)
    }
}
