use futures::future::{BoxFuture, FutureExt as _, Shared};
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::{any::Instance, binding::Binding, errors::ResolveErrorKind, maybe_async::MaybeAsync};

pub(crate) type SharedInstance = Shared<BoxFuture<'static, Result<Instance, Arc<ResolveErrorKind>>>>;

/// Cached value of a binding
#[derive(Clone, Default)]
pub(crate) enum CacheState {
    #[default]
    Unresolved,
    /// Resolution started, every awaiter attaches to the same handle
    Pending(SharedInstance),
    Resolved(Instance),
}

/// Observable state of a binding's cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Unresolved,
    Pending,
    Resolved,
}

impl CacheState {
    pub(crate) fn status(&self) -> CacheStatus {
        match self {
            Self::Unresolved => CacheStatus::Unresolved,
            Self::Pending(shared) => match shared.peek() {
                Some(Ok(_)) => CacheStatus::Resolved,
                Some(Err(_)) => CacheStatus::Unresolved,
                None => CacheStatus::Pending,
            },
            Self::Resolved(_) => CacheStatus::Resolved,
        }
    }

    /// Returns the cached value, promoting a settled pending handle to its final state
    pub(crate) fn lookup(&mut self) -> Option<MaybeAsync<Instance>> {
        match self {
            Self::Unresolved => None,
            Self::Resolved(instance) => Some(MaybeAsync::Ready(instance.clone())),
            Self::Pending(shared) => match shared.peek() {
                Some(Ok(instance)) => {
                    let instance = instance.clone();
                    *self = Self::Resolved(instance.clone());
                    Some(MaybeAsync::Ready(instance))
                }
                Some(Err(_)) => {
                    *self = Self::Unresolved;
                    None
                }
                None => {
                    debug!("Attached to pending resolution");
                    Some(attach(shared.clone()))
                }
            },
        }
    }

    /// Stores a resolution result unless another one got there first, and returns what the cache holds
    pub(crate) fn store(&mut self, value: MaybeAsync<Instance>, owner: Weak<Binding>) -> MaybeAsync<Instance> {
        if let Some(cached) = self.lookup() {
            return cached;
        }

        match value {
            MaybeAsync::Ready(instance) => {
                *self = Self::Resolved(instance.clone());
                MaybeAsync::Ready(instance)
            }
            MaybeAsync::Pending(future) => {
                let shared = async move {
                    let result = future.await.map_err(Arc::new);
                    if let Some(binding) = owner.upgrade() {
                        binding.settle(&result);
                    }
                    result
                }
                .boxed()
                .shared();

                *self = Self::Pending(shared.clone());
                attach(shared)
            }
        }
    }

    /// Settles a pending handle once its future completes
    pub(crate) fn settle(&mut self, result: &Result<Instance, Arc<ResolveErrorKind>>) {
        if let Self::Pending(_) = self {
            *self = match result {
                Ok(instance) => Self::Resolved(instance.clone()),
                Err(_) => Self::Unresolved,
            };
        }
    }
}

fn attach(shared: SharedInstance) -> MaybeAsync<Instance> {
    MaybeAsync::pending(async move { shared.await.map_err(ResolveErrorKind::Shared) })
}
