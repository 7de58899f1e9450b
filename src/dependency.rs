use std::{collections::VecDeque, sync::Arc};

use crate::{
    any::{downcast, Instance, TypeInfo},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    instantiator::Injectable,
    service_id::{ServiceId, Tag},
};

/// Where a dependency is delivered on the dependent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Next positional constructor argument
    Constructor,
    /// Named property set after construction
    Property(&'static str),
}

/// Describes one constructor or property dependency of a type
#[derive(Debug, Clone)]
pub struct Dependency {
    pub service_id: ServiceId,
    pub target: Target,
    pub tags: Vec<Tag>,
    pub multi: bool,
    pub optional: bool,
}

impl Dependency {
    #[inline]
    #[must_use]
    pub fn new(service_id: impl Into<ServiceId>) -> Self {
        Self {
            service_id: service_id.into(),
            target: Target::Constructor,
            tags: Vec::new(),
            multi: false,
            optional: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(ServiceId::of::<T>())
    }

    /// Dependency on a class, which can be auto-bound if the container allows it
    #[inline]
    #[must_use]
    pub fn class<T: Injectable>() -> Self {
        Self::new(ServiceId::class::<T>())
    }

    #[inline]
    #[must_use]
    pub fn property(mut self, name: &'static str) -> Self {
        self.target = Target::Property(name);
        self
    }

    #[inline]
    #[must_use]
    pub fn named(self, name: &'static str) -> Self {
        self.tagged(Tag::named(name))
    }

    #[inline]
    #[must_use]
    pub fn tagged(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    #[inline]
    #[must_use]
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Resolved value of one request
#[derive(Clone)]
pub enum Injected {
    Single(Instance),
    Many(Vec<Instance>),
    /// Optional request without a matching binding
    Absent,
}

impl Injected {
    pub(crate) fn into_single(self, service_id: &ServiceId) -> Result<Instance, ResolveErrorKind> {
        match self {
            Self::Single(instance) => Ok(instance),
            Self::Many(mut instances) if instances.len() == 1 => Ok(instances.remove(0)),
            Self::Many(instances) => Err(ResolveErrorKind::Ambiguous {
                service_id: service_id.clone(),
                count: instances.len(),
            }),
            Self::Absent => Err(ResolveErrorKind::NoBinding {
                service_id: service_id.clone(),
            }),
        }
    }

    pub(crate) fn into_many(self) -> Vec<Instance> {
        match self {
            Self::Single(instance) => vec![instance],
            Self::Many(instances) => instances,
            Self::Absent => Vec::new(),
        }
    }

    /// Downcasts a single value, used by property injection
    pub fn downcast<T: Send + Sync + 'static>(self) -> Result<Arc<T>, InstantiateErrorKind> {
        let incorrect_type = || InstantiateErrorKind::IncorrectType {
            expected: TypeInfo::of::<T>(),
        };
        match self {
            Self::Single(instance) => instance.downcast().map_err(|_| incorrect_type()),
            Self::Many(_) | Self::Absent => Err(incorrect_type()),
        }
    }

    pub fn downcast_all<T: Send + Sync + 'static>(self) -> Result<Vec<Arc<T>>, InstantiateErrorKind> {
        self.into_many()
            .into_iter()
            .map(|instance| {
                instance.downcast().map_err(|_| InstantiateErrorKind::IncorrectType {
                    expected: TypeInfo::of::<T>(),
                })
            })
            .collect()
    }

    pub fn downcast_optional<T: Send + Sync + 'static>(self) -> Result<Option<Arc<T>>, InstantiateErrorKind> {
        match self {
            Self::Absent => Ok(None),
            injected => injected.downcast().map(Some),
        }
    }
}

/// Resolved dependencies handed to a constructor, in descriptor order
#[derive(Default)]
pub struct Arguments {
    constructor: VecDeque<(ServiceId, Injected)>,
    properties: Vec<(&'static str, Injected)>,
}

impl Arguments {
    pub(crate) fn new(values: impl IntoIterator<Item = (Target, ServiceId, Injected)>) -> Self {
        let mut constructor = VecDeque::new();
        let mut properties = Vec::new();
        for (target, service_id, injected) in values {
            match target {
                Target::Constructor => constructor.push_back((service_id, injected)),
                Target::Property(name) => properties.push((name, injected)),
            }
        }
        Self { constructor, properties }
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.constructor.len()
    }

    fn pop(&mut self) -> Result<(ServiceId, Injected), ResolveErrorKind> {
        self.constructor.pop_front().ok_or(ResolveErrorKind::ArgumentsExhausted)
    }

    /// Takes the next constructor argument, which must be a single value
    pub fn next<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>, ResolveErrorKind> {
        let (service_id, injected) = self.pop()?;
        let instance = injected.into_single(&service_id)?;
        downcast(instance, &service_id)
    }

    /// Takes the next constructor argument of a multi-injection
    pub fn next_all<T: Send + Sync + 'static>(&mut self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let (service_id, injected) = self.pop()?;
        injected
            .into_many()
            .into_iter()
            .map(|instance| downcast(instance, &service_id))
            .collect()
    }

    /// Takes the next constructor argument of an optional injection
    pub fn next_optional<T: Send + Sync + 'static>(&mut self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        match self.pop()? {
            (_, Injected::Absent) => Ok(None),
            (service_id, injected) => downcast(injected.into_single(&service_id)?, &service_id).map(Some),
        }
    }

    /// Takes the raw next constructor argument
    pub fn next_injected(&mut self) -> Result<Injected, ResolveErrorKind> {
        self.pop().map(|(_, injected)| injected)
    }

    pub(crate) fn take_properties(&mut self) -> Vec<(&'static str, Injected)> {
        std::mem::take(&mut self.properties)
    }
}

#[cfg(test)]
mod tests {
    use super::{Arguments, Dependency, Injected, Target};
    use crate::{any::Instance, errors::ResolveErrorKind, service_id::ServiceId};

    use std::sync::Arc;

    fn single<T: Send + Sync + 'static>(value: T) -> Injected {
        Injected::Single(Arc::new(value) as Instance)
    }

    #[test]
    fn test_dependency_builder() {
        let dependency = Dependency::of::<u8>().named("small").property("size").optional();

        assert_eq!(dependency.service_id, ServiceId::of::<u8>());
        assert_eq!(dependency.target, Target::Property("size"));
        assert!(dependency.tags[0].is_named());
        assert!(dependency.optional);
        assert!(!dependency.multi);
    }

    #[test]
    fn test_arguments_order() {
        let mut arguments = Arguments::new([
            (Target::Constructor, ServiceId::of::<u8>(), single(1u8)),
            (Target::Property("name"), ServiceId::name("name"), single("katana")),
            (
                Target::Constructor,
                ServiceId::of::<u16>(),
                Injected::Many(vec![Arc::new(2u16) as Instance, Arc::new(3u16) as Instance]),
            ),
            (Target::Constructor, ServiceId::of::<u32>(), Injected::Absent),
        ]);

        assert_eq!(arguments.remaining(), 3);
        assert_eq!(*arguments.next::<u8>().unwrap(), 1);
        assert_eq!(
            arguments.next_all::<u16>().unwrap().iter().map(|val| **val).collect::<Vec<_>>(),
            [2, 3]
        );
        assert!(arguments.next_optional::<u32>().unwrap().is_none());
        assert!(matches!(arguments.next::<u8>(), Err(ResolveErrorKind::ArgumentsExhausted)));

        let properties = arguments.take_properties();
        assert_eq!(properties.len(), 1);
        assert_eq!(properties[0].0, "name");
    }

    #[test]
    fn test_incorrect_type() {
        let mut arguments = Arguments::new([(Target::Constructor, ServiceId::name("size"), single(1u8))]);

        assert!(matches!(
            arguments.next::<u64>(),
            Err(ResolveErrorKind::IncorrectType { service_id, .. }) if service_id == ServiceId::name("size")
        ));
    }

    #[test]
    fn test_injected_downcast() {
        assert_eq!(*single(5u8).downcast::<u8>().unwrap(), 5);
        assert!(single(5u8).downcast::<u16>().is_err());
        assert!(Injected::Absent.downcast_optional::<u8>().unwrap().is_none());
        assert!(Injected::Absent.downcast_all::<u8>().unwrap().is_empty());
    }
}
