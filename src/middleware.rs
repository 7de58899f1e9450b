use std::fmt::{self, Debug, Formatter};

use crate::{
    container::Container,
    dependency::Injected,
    errors::ResolveErrorKind,
    maybe_async::MaybeAsync,
    service::{service_fn, BoxCloneService},
    service_id::{ServiceId, Tag},
};

/// Parameters of one top-level resolution, as seen by middleware
#[derive(Clone)]
pub struct ResolveArgs {
    /// Container the request was made against
    pub container: Container,
    pub service_id: ServiceId,
    pub tags: Vec<Tag>,
    pub multi: bool,
    pub optional: bool,
    /// Select every binding of the identifier, ignoring constraints
    pub avoid_constraints: bool,
}

impl ResolveArgs {
    #[inline]
    #[must_use]
    pub fn new(container: Container, service_id: ServiceId) -> Self {
        Self {
            container,
            service_id,
            tags: Vec::new(),
            multi: false,
            optional: false,
            avoid_constraints: false,
        }
    }
}

impl Debug for ResolveArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveArgs")
            .field("container", &self.container.id())
            .field("service_id", &self.service_id)
            .field("tags", &self.tags)
            .field("multi", &self.multi)
            .field("optional", &self.optional)
            .field("avoid_constraints", &self.avoid_constraints)
            .finish()
    }
}

/// Resolution step a middleware wraps.
///
/// Middleware is any [`tower_layer::Layer<Next>`] whose service handles [`ResolveArgs`];
/// it can change the arguments, short-circuit with its own value, or post-process the result of the wrapped step.
pub type Next = BoxCloneService<ResolveArgs, MaybeAsync<Injected>, ResolveErrorKind>;

/// Innermost step: plans and resolves without any interception
pub(crate) fn base() -> Next {
    BoxCloneService::new(service_fn(|args: ResolveArgs| args.container.plan_and_resolve(&args)))
}

#[cfg(test)]
mod tests {
    use super::{Next, ResolveArgs};
    use crate::{container::Container, dependency::Injected, maybe_async::MaybeAsync, service::Service, service_id::ServiceId};

    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tower_layer::Layer;
    use tracing::debug;
    use tracing_test::traced_test;

    #[derive(Clone)]
    struct CountLayer {
        call_count: Arc<AtomicU8>,
    }

    impl Layer<Next> for CountLayer {
        type Service = Count;

        fn layer(&self, next: Next) -> Self::Service {
            Count {
                next,
                call_count: self.call_count.clone(),
            }
        }
    }

    #[derive(Clone)]
    struct Count {
        next: Next,
        call_count: Arc<AtomicU8>,
    }

    impl Service<ResolveArgs> for Count {
        type Response = MaybeAsync<Injected>;
        type Error = crate::ResolveErrorKind;

        fn call(&mut self, args: ResolveArgs) -> Result<Self::Response, Self::Error> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            debug!(?args, "Intercepted");
            self.next.call(args)
        }
    }

    #[test]
    #[traced_test]
    fn test_layer_wraps_resolution() {
        let call_count = Arc::new(AtomicU8::new(0));

        let container = Container::new();
        container.bind("Port").to_constant_value(8080u16).unwrap();
        container.apply_middleware(CountLayer {
            call_count: call_count.clone(),
        });

        assert_eq!(*container.get::<u16>("Port").unwrap(), 8080);
        assert!(container.try_get::<u16>("Host").unwrap().is_none());
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
        assert!(logs_contain("Intercepted"));
    }

    #[test]
    fn test_layer_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let container = Container::new();
        container.bind("Port").to_constant_value(8080u16).unwrap();
        for name in ["first", "second"] {
            let order = order.clone();
            container.apply_middleware(tower_layer::layer_fn(move |mut next: Next| {
                let order = order.clone();
                crate::service_fn(move |args: ResolveArgs| {
                    order.lock().push(name);
                    next.call(args)
                })
            }));
        }

        let _ = container.get::<u16>(ServiceId::name("Port")).unwrap();

        assert_eq!(*order.lock(), ["second", "first"]);
    }
}
