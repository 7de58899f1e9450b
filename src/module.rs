use futures::future::BoxFuture;
use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
    sync::Arc,
};

use crate::{
    binding::BindingBuilder,
    container::Container,
    context::Context,
    errors::{ContainerErrorKind, InstantiateErrorKind, UnbindErrorKind},
    service_id::ServiceId,
    utils::id::next_id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(u64);

impl ModuleId {
    pub(crate) fn new() -> Self {
        Self(next_id())
    }
}

/// Registration surface handed to a module; everything it binds or hooks is tagged with the module's identity,
/// so unloading the module removes exactly that
#[derive(Clone)]
pub struct ModuleBinder {
    container: Container,
    module_id: ModuleId,
}

impl ModuleBinder {
    pub(crate) fn new(container: Container, module_id: ModuleId) -> Self {
        Self { container, module_id }
    }

    #[inline]
    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    pub fn bind(&self, service_id: impl Into<ServiceId>) -> BindingBuilder {
        self.container.bind_in_module(service_id.into(), Some(self.module_id))
    }

    /// # Errors
    /// Same as [`Container::unbind`]
    pub fn unbind(&self, service_id: impl Into<ServiceId>) -> Result<(), UnbindErrorKind> {
        self.container.unbind(service_id)
    }

    /// # Errors
    /// Same as [`Container::unbind_async`]
    pub async fn unbind_async(&self, service_id: impl Into<ServiceId>) -> Result<(), UnbindErrorKind> {
        self.container.unbind_async(service_id).await
    }

    /// # Errors
    /// Same as [`Container::rebind`]
    pub fn rebind(&self, service_id: impl Into<ServiceId>) -> Result<BindingBuilder, UnbindErrorKind> {
        let service_id = service_id.into();
        self.container.unbind_if_bound(&service_id)?;
        Ok(self.bind(service_id))
    }

    #[must_use]
    pub fn is_bound(&self, service_id: impl Into<ServiceId>) -> bool {
        self.container.is_bound(service_id)
    }

    pub fn on_activation<T, F, E>(&self, service_id: impl Into<ServiceId>, activation: F)
    where
        T: Send + Sync + 'static,
        F: FnMut(&Context, Arc<T>) -> Result<Arc<T>, E> + Clone + Send + Sync + 'static,
        E: Into<InstantiateErrorKind>,
    {
        self.container
            .add_activation(service_id.into(), crate::hooks::boxed_activation(activation), Some(self.module_id));
    }

    pub fn on_activation_async<T, F, Fut, E>(&self, service_id: impl Into<ServiceId>, activation: F)
    where
        T: Send + Sync + 'static,
        F: FnMut(Context, Arc<T>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, E>> + Send + 'static,
        E: Into<InstantiateErrorKind> + 'static,
    {
        self.container
            .add_activation(service_id.into(), crate::hooks::boxed_async_activation(activation), Some(self.module_id));
    }

    pub fn on_deactivation<T, F, E>(&self, service_id: impl Into<ServiceId>, deactivation: F)
    where
        T: Send + Sync + 'static,
        F: FnMut(Arc<T>) -> Result<(), E> + Clone + Send + Sync + 'static,
        E: Into<InstantiateErrorKind>,
    {
        self.container
            .add_deactivation(service_id.into(), crate::hooks::boxed_deactivation(deactivation), Some(self.module_id));
    }

    pub fn on_deactivation_async<T, F, Fut, E>(&self, service_id: impl Into<ServiceId>, deactivation: F)
    where
        T: Send + Sync + 'static,
        F: FnMut(Arc<T>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<InstantiateErrorKind> + 'static,
    {
        self.container.add_deactivation(
            service_id.into(),
            crate::hooks::boxed_async_deactivation(deactivation),
            Some(self.module_id),
        );
    }
}

type Registration = Arc<dyn Fn(&ModuleBinder) -> Result<(), ContainerErrorKind> + Send + Sync>;
type AsyncRegistration = Arc<dyn Fn(ModuleBinder) -> BoxFuture<'static, Result<(), ContainerErrorKind>> + Send + Sync>;

/// Named, revocable batch of bindings and hooks
///
/// # Examples
/// ```rust
/// use ligature::{Container, ContainerModule};
///
/// let module = ContainerModule::new(|binder| {
///     binder.bind("Port").to_constant_value(8080u16)?;
///     Ok(())
/// });
///
/// let container = Container::new();
/// container.load(&[&module])?;
/// assert!(container.is_bound("Port"));
///
/// container.unload(&[module.id()])?;
/// assert!(!container.is_bound("Port"));
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct ContainerModule {
    id: ModuleId,
    registration: Registration,
}

impl ContainerModule {
    #[must_use]
    pub fn new<F>(registration: F) -> Self
    where
        F: Fn(&ModuleBinder) -> Result<(), ContainerErrorKind> + Send + Sync + 'static,
    {
        Self {
            id: ModuleId::new(),
            registration: Arc::new(registration),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub(crate) fn register(&self, binder: &ModuleBinder) -> Result<(), ContainerErrorKind> {
        (self.registration)(binder)
    }
}

impl Debug for ContainerModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerModule").field("id", &self.id).finish_non_exhaustive()
    }
}

/// [`ContainerModule`] whose registration is asynchronous
#[derive(Clone)]
pub struct AsyncContainerModule {
    id: ModuleId,
    registration: AsyncRegistration,
}

impl AsyncContainerModule {
    #[must_use]
    pub fn new<F, Fut>(registration: F) -> Self
    where
        F: Fn(ModuleBinder) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ContainerErrorKind>> + Send + 'static,
    {
        Self {
            id: ModuleId::new(),
            registration: Arc::new(move |binder: ModuleBinder| -> BoxFuture<'static, Result<(), ContainerErrorKind>> {
                Box::pin(registration(binder))
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub(crate) fn register(&self, binder: ModuleBinder) -> BoxFuture<'static, Result<(), ContainerErrorKind>> {
        (self.registration)(binder)
    }
}

impl Debug for AsyncContainerModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncContainerModule").field("id", &self.id).finish_non_exhaustive()
    }
}
