#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod binding;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod constraint;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod dependency;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod hooks;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod maybe_async;
pub(crate) mod middleware;
pub(crate) mod module;
pub(crate) mod planner;
pub(crate) mod registry;
pub(crate) mod resolver;
pub(crate) mod scope;
pub(crate) mod service;
pub(crate) mod service_id;

pub(crate) mod utils;

pub use any::{Instance, TypeInfo};
pub use binding::{Binding, BindingBuilder, BindingId, BindingKind};
pub use cache::CacheStatus;
pub use config::ContainerOptions;
pub use constraint::{constraint, Constraint, ConstraintTarget};
pub use container::{Container, ContainerId, GetAllOptions};
pub use context::Context;
pub use dependency::{Arguments, Dependency, Injected, Target};
pub use dependency_resolver::DependencyResolver;
pub use errors::{
    BindingErrorKind, ConfigErrorKind, ContainerErrorKind, DeactivateError, InstantiateErrorKind, ResolveErrorKind, UnbindErrorKind,
};
pub use inject::{Inject, InjectAll, InjectOptional};
pub use instantiator::{Class, Injectable, Instantiator, Provider};
pub use maybe_async::MaybeAsync;
pub use middleware::{Next, ResolveArgs};
pub use module::{AsyncContainerModule, ContainerModule, ModuleBinder, ModuleId};
pub use planner::{BindingPlan, Plan, Request};
pub use scope::BindingScope;
pub use service::{service_fn, BoxCloneService, Service, ServiceFn};
pub use service_id::{ServiceId, Symbol, Tag, NAMED_TAG};
