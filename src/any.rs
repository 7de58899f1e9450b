use std::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use crate::{errors::ResolveErrorKind, service_id::ServiceId};

/// A resolved value as stored in binding caches and handed between resolution steps.
pub type Instance = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        // Generic arguments may contain `::` too, so only strip the path before them.
        let head = self.name.split_once('<').map_or(self.name, |(head, _)| head);
        match head.rsplit_once("::") {
            Some((path, _)) => &self.name[path.len() + 2..],
            None => self.name,
        }
    }
}

/// Downcasts a type-erased instance, reporting the identifier it was resolved for on mismatch.
pub(crate) fn downcast<T: Send + Sync + 'static>(instance: Instance, service_id: &ServiceId) -> Result<Arc<T>, ResolveErrorKind> {
    instance.downcast::<T>().map_err(|_| ResolveErrorKind::IncorrectType {
        service_id: service_id.clone(),
        expected: TypeInfo::of::<T>(),
    })
}

#[cfg(test)]
mod tests {
    use super::{downcast, Instance, TypeInfo};
    use crate::{errors::ResolveErrorKind, service_id::ServiceId};

    use std::sync::Arc;

    struct Plain;
    struct Wrapper<T>(T);

    #[test]
    fn test_short_name() {
        assert_eq!(TypeInfo::of::<Plain>().short_name(), "Plain");
        assert_eq!(TypeInfo::of::<Wrapper<Plain>>().short_name(), "Wrapper<ligature::any::tests::Plain>");
        assert_eq!(TypeInfo::of::<u8>().short_name(), "u8");
    }

    #[test]
    fn test_equality_by_type_id() {
        assert_eq!(TypeInfo::of::<Plain>(), TypeInfo::of::<Plain>());
        assert_ne!(TypeInfo::of::<Plain>(), TypeInfo::of::<Wrapper<Plain>>());
    }

    #[test]
    fn test_downcast() {
        let instance: Instance = Arc::new(5u32);
        let service_id = ServiceId::name("five");

        assert_eq!(*downcast::<u32>(instance.clone(), &service_id).unwrap(), 5);
        assert!(matches!(
            downcast::<u64>(instance, &service_id),
            Err(ResolveErrorKind::IncorrectType { .. })
        ));
    }
}
