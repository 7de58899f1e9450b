#![allow(dead_code)]

use criterion::{criterion_group, criterion_main, Criterion};
use ligature::{Container, Inject, InstantiateErrorKind, ServiceId};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C(Arc<CA>);
struct CA(Arc<CAA>);
struct CAA(Arc<CAAA>);
struct CAAA;

fn bind_chain(container: &Container) {
    container
        .bind(ServiceId::of::<CAAA>())
        .to_instantiator(|| Ok::<_, InstantiateErrorKind>(CAAA))
        .unwrap();
    container
        .bind(ServiceId::of::<CAA>())
        .to_instantiator(|Inject(caaa): Inject<CAAA>| Ok::<_, InstantiateErrorKind>(CAA(caaa)))
        .unwrap();
    container
        .bind(ServiceId::of::<CA>())
        .to_instantiator(|Inject(caa): Inject<CAA>| Ok::<_, InstantiateErrorKind>(CA(caa)))
        .unwrap();
    container
        .bind(ServiceId::of::<C>())
        .to_instantiator(|Inject(ca): Inject<CA>| Ok::<_, InstantiateErrorKind>(C(ca)))
        .unwrap();
    container
        .bind(ServiceId::of::<B>())
        .to_instantiator(|| Ok::<_, InstantiateErrorKind>(B(2)))
        .unwrap();
}

fn transient_container() -> Container {
    let container = Container::new();
    bind_chain(&container);
    container
        .bind(ServiceId::of::<A>())
        .to_instantiator(|Inject(b): Inject<B>, Inject(c): Inject<C>| Ok::<_, InstantiateErrorKind>(A(b, c)))
        .unwrap();
    container
}

fn singleton_container() -> Container {
    let container = Container::new();
    bind_chain(&container);
    container
        .bind(ServiceId::of::<A>())
        .to_instantiator(|Inject(b): Inject<B>, Inject(c): Inject<C>| Ok::<_, InstantiateErrorKind>(A(b, c)))
        .unwrap()
        .in_singleton_scope()
        .unwrap();
    container
}

#[inline]
fn container_get(container: &Container) {
    let _ = container.get::<A>(ServiceId::of::<A>()).unwrap();
}

#[inline]
fn container_child_get(container: &Container) {
    let child = container.create_child();
    let _ = child.get::<A>(ServiceId::of::<A>()).unwrap();
}

#[inline]
fn container_snapshot_restore(container: &Container) {
    container.snapshot();
    container.bind("Port").to_constant_value(80u16).unwrap();
    container.restore().unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

    let transient = transient_container();
    let singleton = singleton_container();
    let _ = singleton.get::<A>(ServiceId::of::<A>()).unwrap();

    c.bench_function("container_new_with_bindings", |b| b.iter(transient_container))
        .bench_function("container_get_transient", |b| b.iter(|| container_get(&transient)))
        .bench_function("container_get_singleton", |b| b.iter(|| container_get(&singleton)))
        .bench_function("container_child_get", |b| b.iter(|| container_child_get(&transient)))
        .bench_function("container_get_async", |b| {
            b.iter(|| {
                runtime.block_on(async {
                    let _ = transient.get_async::<A>(ServiceId::of::<A>()).await.unwrap();
                });
            });
        })
        .bench_function("container_snapshot_restore", |b| {
            let container = transient_container();
            b.iter(|| container_snapshot_restore(&container));
        });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
