use futures::future::{self, BoxFuture, FutureExt as _, TryFutureExt as _};
use std::{
    fmt::{self, Debug, Formatter},
    future::{Future, IntoFuture},
};

use crate::errors::ResolveErrorKind;

/// A value that is either available now or will be produced by a future.
///
/// Resolution keeps values in the [`MaybeAsync::Ready`] state for as long as possible,
/// so synchronous entry points only fail when something in the dependency chain is actually pending.
pub enum MaybeAsync<T, E = ResolveErrorKind> {
    Ready(T),
    Pending(BoxFuture<'static, Result<T, E>>),
}

impl<T, E> MaybeAsync<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    #[inline]
    #[must_use]
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Returns the ready value, or gives the pending value back
    #[inline]
    pub fn try_ready(self) -> Result<T, Self> {
        match self {
            Self::Ready(value) => Ok(value),
            pending @ Self::Pending(_) => Err(pending),
        }
    }

    #[must_use]
    pub fn map<U, F>(self, f: F) -> MaybeAsync<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Self::Ready(value) => MaybeAsync::Ready(f(value)),
            Self::Pending(future) => MaybeAsync::Pending(Box::pin(future.map_ok(f))),
        }
    }

    #[must_use]
    pub fn map_err<E2, F>(self, f: F) -> MaybeAsync<T, E2>
    where
        E2: Send + 'static,
        F: FnOnce(E) -> E2 + Send + 'static,
    {
        match self {
            Self::Ready(value) => MaybeAsync::Ready(value),
            Self::Pending(future) => MaybeAsync::Pending(Box::pin(future.map_err(f))),
        }
    }

    /// Chains a step that runs once the value is available.
    /// A ready value runs the step immediately, so its error is returned right away.
    pub fn and_then<U, F>(self, f: F) -> Result<MaybeAsync<U, E>, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<MaybeAsync<U, E>, E> + Send + 'static,
    {
        match self {
            Self::Ready(value) => f(value),
            Self::Pending(future) => Ok(MaybeAsync::pending(async move {
                let value = future.await?;
                f(value)?.await
            })),
        }
    }

    /// Collects values, keeping their order.
    /// If any value is pending, all of them are driven together and the result is pending.
    #[must_use]
    pub fn join_all(values: Vec<Self>) -> MaybeAsync<Vec<T>, E> {
        if !values.iter().any(Self::is_pending) {
            return MaybeAsync::Ready(
                values
                    .into_iter()
                    .filter_map(|value| match value {
                        Self::Ready(value) => Some(value),
                        Self::Pending(_) => None,
                    })
                    .collect(),
            );
        }

        let futures: Vec<_> = values.into_iter().map(IntoFuture::into_future).collect();
        MaybeAsync::Pending(future::try_join_all(futures).boxed())
    }
}

impl<T, E> IntoFuture for MaybeAsync<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = BoxFuture<'static, Result<T, E>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Ready(value) => future::ready(Ok(value)).boxed(),
            Self::Pending(future) => future,
        }
    }
}

impl<T: Debug, E> Debug for MaybeAsync<T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}
