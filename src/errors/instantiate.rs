use crate::any::TypeInfo;

use super::ResolveErrorKind;

/// Error returned by user code: constructors, computed values, factories, providers and hooks
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
    #[error("Incorrect value type, expected {expected}")]
    IncorrectType { expected: TypeInfo },
    #[error(transparent)]
    Resolve(Box<ResolveErrorKind>),
}

impl From<ResolveErrorKind> for InstantiateErrorKind {
    fn from(err: ResolveErrorKind) -> Self {
        Self::Resolve(Box::new(err))
    }
}
