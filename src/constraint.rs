use std::{borrow::Cow, sync::Arc};

use crate::service_id::{ServiceId, Tag};

/// Predicate deciding whether a binding can satisfy a request
pub type Constraint = Arc<dyn Fn(&ConstraintTarget<'_>) -> bool + Send + Sync>;

/// The request a constraint is checked against
#[derive(Debug, Clone, Copy)]
pub struct ConstraintTarget<'a> {
    pub service_id: &'a ServiceId,
    pub tags: &'a [Tag],
    /// Dependents of the request, from the top-level request down to the direct parent
    pub ancestors: &'a [ServiceId],
}

impl ConstraintTarget<'_> {
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&ServiceId> {
        self.ancestors.last()
    }

    #[must_use]
    pub fn is_tagged(&self, key: &str, value: &str) -> bool {
        self.tags.iter().any(|tag| tag.key == key && tag.value == value)
    }

    #[inline]
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.is_tagged(crate::service_id::NAMED_TAG, name)
    }
}

/// Boxes a predicate into a [`Constraint`]
#[inline]
#[must_use]
pub fn constraint<F>(predicate: F) -> Constraint
where
    F: Fn(&ConstraintTarget<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(predicate)
}

pub(crate) fn named(name: impl Into<Cow<'static, str>>) -> Constraint {
    let name = name.into();
    constraint(move |target| target.is_named(&name))
}

pub(crate) fn tagged(key: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Constraint {
    let (key, value) = (key.into(), value.into());
    constraint(move |target| target.is_tagged(&key, &value))
}

pub(crate) fn injected_into(parent: ServiceId) -> Constraint {
    constraint(move |target| target.parent() == Some(&parent))
}

pub(crate) fn any_ancestor_is(ancestor: ServiceId) -> Constraint {
    constraint(move |target| target.ancestors.contains(&ancestor))
}

pub(crate) fn no_ancestor_is(ancestor: ServiceId) -> Constraint {
    constraint(move |target| !target.ancestors.contains(&ancestor))
}
