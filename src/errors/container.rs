use super::{BindingErrorKind, ConfigErrorKind, ResolveErrorKind, UnbindErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum ContainerErrorKind {
    #[error(transparent)]
    Binding(#[from] BindingErrorKind),
    #[error(transparent)]
    Unbind(#[from] UnbindErrorKind),
    #[error(transparent)]
    Config(#[from] ConfigErrorKind),
    #[error(transparent)]
    Resolve(#[from] ResolveErrorKind),
    #[error("No snapshot available to restore")]
    NoSnapshot,
}
