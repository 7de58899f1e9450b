mod binding;
mod config;
mod container;
mod instantiate;
mod resolve;
mod unbind;

pub use binding::BindingErrorKind;
pub use config::ConfigErrorKind;
pub use container::ContainerErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use resolve::ResolveErrorKind;
pub use unbind::{DeactivateError, UnbindErrorKind};
