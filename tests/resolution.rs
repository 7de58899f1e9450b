use ligature::{
    Arguments, BindingKind, CacheStatus, Class, Container, Dependency, Inject, InjectAll, InjectOptional, Injectable, Injected,
    InstantiateErrorKind, Provider, ResolveErrorKind, ServiceId, Symbol,
};
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

struct Logger;

struct Katana;

impl Injectable for Katana {
    fn construct(_: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
        Ok(Self)
    }
}

struct Ninja {
    katana: Arc<Katana>,
    shuriken: Option<Arc<u8>>,
}

impl Injectable for Ninja {
    fn dependencies() -> Vec<Dependency> {
        vec![
            Dependency::class::<Katana>(),
            Dependency::new("Shuriken").property("shuriken"),
        ]
    }

    fn construct(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
        Ok(Self {
            katana: arguments.next()?,
            shuriken: None,
        })
    }

    fn inject(&mut self, property: &'static str, value: Injected) -> Result<(), InstantiateErrorKind> {
        if property == "shuriken" {
            self.shuriken = Some(value.downcast()?);
        }
        Ok(())
    }
}

#[test]
fn test_logger_singleton_identity() {
    let logger = Symbol::new("LOGGER");

    let container = Container::new();
    container
        .bind(&logger)
        .to_dynamic_value(|_| Ok::<_, InstantiateErrorKind>(Logger))
        .unwrap()
        .in_singleton_scope()
        .unwrap();

    let first = container.get::<Logger>(&logger).unwrap();
    let second = container.get::<Logger>(&logger).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_transient_by_default() {
    let container = Container::new();
    container.bind(ServiceId::class::<Katana>()).to_self().unwrap();

    let first = container.get::<Katana>(ServiceId::class::<Katana>()).unwrap();
    let second = container.get::<Katana>(ServiceId::class::<Katana>()).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn test_get_all_registration_order() {
    let container = Container::new();
    container.bind("Port").to_constant_value(80u16).unwrap();
    container.bind("Port").to_constant_value(443u16).unwrap();

    let ports: Vec<u16> = container.get_all::<u16>("Port").unwrap().into_iter().map(|port| *port).collect();
    assert_eq!(ports, [80, 443]);

    container.bind("Port").to_constant_value(8080u16).unwrap();

    let ports: Vec<u16> = container.get_all::<u16>("Port").unwrap().into_iter().map(|port| *port).collect();
    assert_eq!(ports, [80, 443, 8080]);
    assert!(container.try_get_all::<u16>("Host").unwrap().is_empty());
    assert!(matches!(container.get_all::<u16>("Host"), Err(ResolveErrorKind::NoBinding { .. })));
}

#[tokio::test]
async fn test_get_all_async() {
    let container = Container::new();
    container.bind("Port").to_constant_value(80u16).unwrap();
    container
        .bind("Port")
        .to_async_dynamic_value(|_| async {
            tokio::task::yield_now().await;
            Ok::<_, InstantiateErrorKind>(443u16)
        })
        .unwrap();

    let ports: Vec<u16> = container.get_all_async::<u16>("Port").await.unwrap().into_iter().map(|port| *port).collect();
    assert_eq!(ports, [80, 443]);
    assert!(matches!(container.get_all::<u16>("Port"), Err(ResolveErrorKind::LazySync { .. })));

    assert_eq!(container.try_get_all_async::<u16>("Port").await.unwrap().len(), 2);
    assert!(container.try_get_all_async::<u16>("Host").await.unwrap().is_empty());
    assert!(matches!(
        container.get_all_async::<u16>("Host").await,
        Err(ResolveErrorKind::NoBinding { .. })
    ));
}

#[test]
fn test_try_get_all_named() {
    let container = Container::new();
    container.bind("Weapon").to_constant_value("katana").unwrap().when_named("strong");
    container.bind("Weapon").to_constant_value("shuriken").unwrap().when_named("weak");

    assert_eq!(*container.try_get_all_named::<&str>("Weapon", "strong").unwrap()[0], "katana");
    assert!(container.try_get_all_named::<&str>("Weapon", "heavy").unwrap().is_empty());
    assert!(container.try_get_all_named::<&str>("Shield", "strong").unwrap().is_empty());
    assert_eq!(container.try_get_all::<&str>("Weapon").unwrap().len(), 2);
}

#[test]
fn test_function_binding() {
    type Greet = fn(&str) -> String;

    fn greet(name: &str) -> String {
        format!("Hello, {name}")
    }

    let container = Container::new();
    container.bind("Greet").to_function(greet as Greet).unwrap();

    let first = container.get::<Greet>("Greet").unwrap();
    let second = container.get::<Greet>("Greet").unwrap();

    assert_eq!(first("Ninja"), "Hello, Ninja");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_unbind_then_resolve() {
    let container = Container::new();
    container.bind("Port").to_constant_value(80u16).unwrap();
    let _ = container.get::<u16>("Port").unwrap();

    container.unbind("Port").unwrap();

    assert!(matches!(container.get::<u16>("Port"), Err(ResolveErrorKind::NoBinding { .. })));
}

#[test]
fn test_circular_dependency() {
    struct A;
    struct B;

    let container = Container::new();
    container
        .bind(ServiceId::of::<A>())
        .to_instantiator(|Inject(_): Inject<B>| Ok::<_, InstantiateErrorKind>(A))
        .unwrap();
    container
        .bind(ServiceId::of::<B>())
        .to_instantiator(|Inject(_): Inject<A>| Ok::<_, InstantiateErrorKind>(B))
        .unwrap();

    let Err(ResolveErrorKind::CircularDependency { path }) = container.get::<A>(ServiceId::of::<A>()) else {
        panic!("expected a circular dependency");
    };
    assert_eq!(path, [ServiceId::of::<A>(), ServiceId::of::<B>(), ServiceId::of::<A>()]);
}

#[test]
fn test_optional_dependency_breaks_nothing() {
    struct A(Option<Arc<u8>>);

    let container = Container::new();
    container
        .bind(ServiceId::of::<A>())
        .to_instantiator(|InjectOptional(value): InjectOptional<u8>| Ok::<_, InstantiateErrorKind>(A(value)))
        .unwrap();

    assert!(container.get::<A>(ServiceId::of::<A>()).unwrap().0.is_none());

    container.bind(ServiceId::of::<u8>()).to_constant_value(7u8).unwrap();

    assert_eq!(container.get::<A>(ServiceId::of::<A>()).unwrap().0.as_deref(), Some(&7));
}

#[test]
fn test_multi_injection() {
    struct Arsenal(Vec<Arc<&'static str>>);

    let container = Container::new();
    container.bind(ServiceId::of::<&'static str>()).to_constant_value("katana").unwrap();
    container.bind(ServiceId::of::<&'static str>()).to_constant_value("shuriken").unwrap();
    container
        .bind(ServiceId::of::<Arsenal>())
        .to_instantiator(|InjectAll(weapons): InjectAll<&'static str>| Ok::<_, InstantiateErrorKind>(Arsenal(weapons)))
        .unwrap();

    let arsenal = container.get::<Arsenal>(ServiceId::of::<Arsenal>()).unwrap();
    let weapons: Vec<&str> = arsenal.0.iter().map(|weapon| **weapon).collect();

    assert_eq!(weapons, ["katana", "shuriken"]);
}

#[test]
fn test_property_injection() {
    let container = Container::new();
    container.bind(ServiceId::class::<Katana>()).to_self().unwrap();
    container.bind("Shuriken").to_constant_value(3u8).unwrap();
    container.bind(ServiceId::class::<Ninja>()).to_self().unwrap();

    let ninja = container.get::<Ninja>(ServiceId::class::<Ninja>()).unwrap();

    assert_eq!(ninja.shuriken.as_deref(), Some(&3));
    let _ = &ninja.katana;
}

#[tokio::test]
async fn test_pending_chain_resolves_async() {
    struct Repository(Arc<String>);

    let container = Container::new();
    container
        .bind(ServiceId::of::<String>())
        .to_async_dynamic_value(|_| async {
            tokio::task::yield_now().await;
            Ok::<_, InstantiateErrorKind>(String::from("postgres://"))
        })
        .unwrap();
    container
        .bind(ServiceId::of::<Repository>())
        .to_instantiator(|Inject(url): Inject<String>| Ok::<_, InstantiateErrorKind>(Repository(url)))
        .unwrap();

    assert!(matches!(
        container.get::<Repository>(ServiceId::of::<Repository>()),
        Err(ResolveErrorKind::LazySync { .. })
    ));

    let repository = container.get_async::<Repository>(ServiceId::of::<Repository>()).await.unwrap();
    assert_eq!(*repository.0, "postgres://");
}

#[tokio::test]
async fn test_concurrent_singleton_constructed_once() {
    let call_count = Arc::new(AtomicU8::new(0));
    let clock = Symbol::new("CLOCK");

    let container = Container::new();
    container
        .bind(&clock)
        .to_async_dynamic_value({
            let call_count = call_count.clone();
            move |_| {
                let call_count = call_count.clone();
                async move {
                    call_count.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok::<_, InstantiateErrorKind>(42u64)
                }
            }
        })
        .unwrap()
        .in_singleton_scope()
        .unwrap();

    let first = container.get_async::<u64>(&clock);
    let second = container.get_async::<u64>(&clock);
    let sync_attempt = container.get_all::<u64>(&clock).err();

    let (first, second) = tokio::join!(first, second);
    let (first, second) = (first.unwrap(), second.unwrap());

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
    assert!(matches!(sync_attempt, Some(ResolveErrorKind::LazySync { .. })));

    let third = container.get::<u64>(&clock).unwrap();
    assert!(Arc::ptr_eq(&first, &third));
}

#[test]
fn test_child_resolves_parent_singleton() {
    let parent = Container::new();
    parent
        .bind("ServiceB")
        .to_dynamic_value(|_| Ok::<_, InstantiateErrorKind>(Logger))
        .unwrap()
        .in_singleton_scope()
        .unwrap();
    let cached = parent.get::<Logger>("ServiceB").unwrap();

    let child = parent.create_child();

    assert!(!child.is_current_bound("ServiceB"));
    assert!(child.is_bound("ServiceB"));
    assert!(Arc::ptr_eq(&child.get::<Logger>("ServiceB").unwrap(), &cached));
}

#[test]
fn test_delegate_follows_target_scope() {
    let container = Container::new();
    container
        .bind(ServiceId::class::<Katana>())
        .to_self()
        .unwrap()
        .in_singleton_scope()
        .unwrap();
    let delegate = container.bind("Weapon").to_service(ServiceId::class::<Katana>()).unwrap();

    let first = container.get::<Katana>("Weapon").unwrap();
    let second = container.get::<Katana>(ServiceId::class::<Katana>()).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(delegate.binding().kind(), Some(BindingKind::DelegateToService));
    assert_eq!(delegate.binding().cache_status(), CacheStatus::Unresolved);
    assert!(delegate.in_singleton_scope().is_err());
}

#[test]
fn test_factory_builds_callable_once() {
    type MakeGreeting = Box<dyn Fn(&str) -> String + Send + Sync>;

    let call_count = Arc::new(AtomicU8::new(0));

    let container = Container::new();
    container.bind("Greeting").to_constant_value("Hello").unwrap();
    container
        .bind("MakeGreeting")
        .to_factory({
            let call_count = call_count.clone();
            move |context| {
                call_count.fetch_add(1, Ordering::SeqCst);
                let greeting = context.container.get::<&str>("Greeting")?;
                Ok::<MakeGreeting, ResolveErrorKind>(Box::new(move |name: &str| format!("{greeting}, {name}")))
            }
        })
        .unwrap();

    let make = container.get::<MakeGreeting>("MakeGreeting").unwrap();
    assert_eq!(make("Ninja"), "Hello, Ninja");
    assert_eq!(make("Samurai"), "Hello, Samurai");

    let _ = container.get::<MakeGreeting>("MakeGreeting").unwrap();
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_provider_runs_every_call() {
    let call_count = Arc::new(AtomicU8::new(0));

    let container = Container::new();
    container
        .bind("Katana")
        .to_provider({
            let call_count = call_count.clone();
            move |_| {
                let call_count = call_count.clone();
                async move {
                    call_count.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, InstantiateErrorKind>(Arc::new(Katana))
                }
            }
        })
        .unwrap();

    let provider = container.get::<Provider<Katana>>("Katana").unwrap();
    let first = provider().await.unwrap();
    let second = provider().await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(call_count.load(Ordering::SeqCst), 2);

    drop(container);
    assert!(provider().await.is_err());
}

#[test]
fn test_raw_constructor() {
    let container = Container::new();
    container.bind("KatanaClass").to_constructor(Class::of::<Katana>()).unwrap();

    let class = container.get::<Class>("KatanaClass").unwrap();

    assert_eq!(*class, Class::of::<Katana>());
    assert!(class.instantiate(Arguments::default()).unwrap().downcast::<Katana>().is_ok());
}

#[test]
fn test_named_and_tagged() {
    let container = Container::new();
    container.bind("Weapon").to_constant_value("katana").unwrap().when_named("melee");
    container
        .bind("Weapon")
        .to_constant_value("shuriken")
        .unwrap()
        .when_tagged("range", "far");
    container.bind("Weapon").to_constant_value("bo").unwrap();

    assert_eq!(*container.get_named::<&str>("Weapon", "melee").unwrap(), "katana");
    assert_eq!(*container.get_tagged::<&str>("Weapon", "range", "far").unwrap(), "shuriken");
    assert_eq!(*container.get::<&str>("Weapon").unwrap(), "bo");
    assert!(container.try_get_tagged::<&str>("Weapon", "range", "near").unwrap().is_none());
}

#[test]
fn test_injected_into_constraint() {
    struct Samurai(Arc<&'static str>);
    struct Monk(Arc<&'static str>);

    let container = Container::new();
    container
        .bind(ServiceId::of::<&'static str>())
        .to_constant_value("katana")
        .unwrap()
        .when_injected_into(ServiceId::of::<Samurai>());
    container
        .bind(ServiceId::of::<&'static str>())
        .to_constant_value("staff")
        .unwrap()
        .when_injected_into(ServiceId::of::<Monk>());
    container
        .bind(ServiceId::of::<Samurai>())
        .to_instantiator(|Inject(weapon): Inject<&'static str>| Ok::<_, InstantiateErrorKind>(Samurai(weapon)))
        .unwrap();
    container
        .bind(ServiceId::of::<Monk>())
        .to_instantiator(|Inject(weapon): Inject<&'static str>| Ok::<_, InstantiateErrorKind>(Monk(weapon)))
        .unwrap();

    assert_eq!(*container.get::<Samurai>(ServiceId::of::<Samurai>()).unwrap().0, "katana");
    assert_eq!(*container.get::<Monk>(ServiceId::of::<Monk>()).unwrap().0, "staff");
}

#[test]
fn test_ambiguous() {
    let container = Container::new();
    container.bind("Port").to_constant_value(80u16).unwrap();
    container.bind("Port").to_constant_value(443u16).unwrap();

    assert!(matches!(
        container.get::<u16>("Port"),
        Err(ResolveErrorKind::Ambiguous { count: 2, .. })
    ));
}
