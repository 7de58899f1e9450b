use std::{collections::BTreeMap, sync::Arc};

use crate::{binding::Binding, errors::ResolveErrorKind, service_id::ServiceId};

/// Bindings per service identifier, in registration order
#[derive(Default)]
pub(crate) struct Registry {
    bindings: BTreeMap<ServiceId, Vec<Arc<Binding>>>,
}

impl Registry {
    pub(crate) fn add(&mut self, binding: Arc<Binding>) {
        self.bindings.entry(binding.service_id().clone()).or_default().push(binding);
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::NoBinding`] if there is no entry for the identifier
    pub(crate) fn get(&self, service_id: &ServiceId) -> Result<&[Arc<Binding>], ResolveErrorKind> {
        self.bindings
            .get(service_id)
            .map(Vec::as_slice)
            .ok_or_else(|| ResolveErrorKind::NoBinding {
                service_id: service_id.clone(),
            })
    }

    #[inline]
    pub(crate) fn has(&self, service_id: &ServiceId) -> bool {
        self.bindings.contains_key(service_id)
    }

    pub(crate) fn remove(&mut self, service_id: &ServiceId) -> Vec<Arc<Binding>> {
        self.bindings.remove(service_id).unwrap_or_default()
    }

    /// Removes every binding matching `condition`, returning them in identifier then registration order
    pub(crate) fn remove_by_condition(&mut self, mut condition: impl FnMut(&Binding) -> bool) -> Vec<Arc<Binding>> {
        let mut removed = Vec::new();
        self.bindings.retain(|_, bindings| {
            let (matched, kept): (Vec<_>, Vec<_>) = bindings.drain(..).partition(|binding| condition(binding));
            removed.extend(matched);
            *bindings = kept;
            !bindings.is_empty()
        });
        removed
    }

    pub(crate) fn traverse(&self, mut visit: impl FnMut(&ServiceId, &[Arc<Binding>])) {
        for (service_id, bindings) in &self.bindings {
            visit(service_id, bindings);
        }
    }

    pub(crate) fn all(&self) -> Vec<Arc<Binding>> {
        let mut all = Vec::new();
        self.traverse(|_, bindings| all.extend_from_slice(bindings));
        all
    }

    /// Copy whose bindings have private caches, so later resolutions don't leak into it
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            bindings: self
                .bindings
                .iter()
                .map(|(service_id, bindings)| {
                    (
                        service_id.clone(),
                        bindings.iter().map(|binding| Arc::new(binding.duplicate())).collect(),
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::{binding::Binding, errors::ResolveErrorKind, scope::BindingScope, service_id::ServiceId};

    use std::sync::Arc;

    fn binding(name: &'static str) -> Arc<Binding> {
        Arc::new(Binding::new(ServiceId::name(name), BindingScope::Transient, None))
    }

    #[test]
    fn test_registration_order() {
        let mut registry = Registry::default();
        let (first, second) = (binding("Weapon"), binding("Weapon"));
        registry.add(first.clone());
        registry.add(binding("Armor"));
        registry.add(second.clone());

        let bindings = registry.get(&ServiceId::name("Weapon")).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].id(), first.id());
        assert_eq!(bindings[1].id(), second.id());
        assert!(matches!(
            registry.get(&ServiceId::name("Shield")),
            Err(ResolveErrorKind::NoBinding { .. })
        ));
    }

    #[test]
    fn test_remove() {
        let mut registry = Registry::default();
        registry.add(binding("Weapon"));
        registry.add(binding("Weapon"));

        assert_eq!(registry.remove(&ServiceId::name("Weapon")).len(), 2);
        assert!(!registry.has(&ServiceId::name("Weapon")));
        assert!(registry.remove(&ServiceId::name("Weapon")).is_empty());
    }

    #[test]
    fn test_remove_by_condition() {
        let mut registry = Registry::default();
        let kept = binding("Weapon");
        registry.add(kept.clone());
        registry.add(binding("Weapon"));
        registry.add(binding("Armor"));

        let removed = registry.remove_by_condition(|binding| binding.id() != kept.id());

        assert_eq!(removed.len(), 2);
        assert!(!registry.has(&ServiceId::name("Armor")));
        assert_eq!(registry.get(&ServiceId::name("Weapon")).unwrap().len(), 1);

        let mut visited = Vec::new();
        registry.traverse(|service_id, bindings| visited.push((service_id.clone(), bindings.len())));
        assert_eq!(visited, [(ServiceId::name("Weapon"), 1)]);
    }

    #[test]
    fn test_duplicate() {
        let mut registry = Registry::default();
        let original = binding("Weapon");
        registry.add(original.clone());

        let copy = registry.duplicate();
        let copied = &copy.get(&ServiceId::name("Weapon")).unwrap()[0];

        assert_eq!(copied.id(), original.id());
        assert!(!Arc::ptr_eq(copied, &original));
    }
}
