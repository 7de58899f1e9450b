use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use super::InstantiateErrorKind;
use crate::{any::TypeInfo, service_id::ServiceId};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No matching bindings found for {service_id:?}")]
    NoBinding { service_id: ServiceId },
    #[error("Ambiguous match for {service_id:?}, {count} bindings match the request")]
    Ambiguous { service_id: ServiceId, count: usize },
    #[error("Circular dependency found: {}", DependencyPath(path))]
    CircularDependency { path: Vec<ServiceId> },
    #[error("Binding for {service_id:?} has no implementation, call one of the `to*` methods first")]
    MissingImplementation { service_id: ServiceId },
    #[error("Can't resolve {service_id:?} synchronously, its dependency chain is pending. Use the async variant")]
    LazySync { service_id: ServiceId },
    #[error("Incorrect type resolved for {service_id:?}, expected {expected}")]
    IncorrectType { service_id: ServiceId, expected: TypeInfo },
    #[error("Failed to instantiate {service_id:?}: {source}")]
    Instantiate {
        service_id: ServiceId,
        source: InstantiateErrorKind,
    },
    #[error(transparent)]
    Shared(Arc<ResolveErrorKind>),
    #[error("Constructor requested more arguments than it declared")]
    ArgumentsExhausted,
}

impl ResolveErrorKind {
    /// Returns the error a shared pending resolution failed with, unwrapping sharing layers
    #[must_use]
    pub fn root(&self) -> &ResolveErrorKind {
        match self {
            Self::Shared(err) => err.root(),
            err => err,
        }
    }
}

struct DependencyPath<'a>(&'a [ServiceId]);

impl Display for DependencyPath<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, service_id) in self.0.iter().enumerate() {
            if index != 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{service_id}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ResolveErrorKind;
    use crate::service_id::ServiceId;

    use std::sync::Arc;

    #[test]
    fn test_circular_dependency_display() {
        let err = ResolveErrorKind::CircularDependency {
            path: vec![ServiceId::name("A"), ServiceId::name("B"), ServiceId::name("A")],
        };

        assert_eq!(err.to_string(), "Circular dependency found: A -> B -> A");
    }

    #[test]
    fn test_root() {
        let err = ResolveErrorKind::Shared(Arc::new(ResolveErrorKind::Shared(Arc::new(ResolveErrorKind::ArgumentsExhausted))));

        assert!(matches!(err.root(), ResolveErrorKind::ArgumentsExhausted));
    }
}
