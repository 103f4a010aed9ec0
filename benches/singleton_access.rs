use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use forgecore::Singleton;
use forgecore::singleton::SingletonRegistry;

#[derive(Default, Singleton)]
#[singleton(policy = "eager")]
struct EagerService {
    data: [u64; 8],
}

#[derive(Default, Singleton)]
#[singleton(policy = "locked")]
struct LockedService {
    data: [u64; 8],
}

#[derive(Default, Singleton)]
#[singleton(policy = "lazy")]
struct LazyService {
    data: [u64; 8],
}

macro_rules! bench_policy {
    ($c:expr, $name:literal, $ty:ty) => {{
        let mut group = $c.benchmark_group($name);

        // Every batch starts from a vacant slot
        group.bench_function("first_access", |b| {
            b.iter_batched(
                SingletonRegistry::new,
                |registry| {
                    let v = registry.instance::<$ty>().unwrap();
                    black_box(v.data.len());
                },
                BatchSize::SmallInput,
            )
        });

        let registry = SingletonRegistry::new();
        let access = registry.access::<$ty>().unwrap();
        let _ = access.instance().unwrap();

        group.bench_function("steady_state", |b| {
            b.iter(|| {
                let v = access.instance().unwrap();
                black_box(&v.data);
            })
        });

        group.bench_function("registry_lookup", |b| {
            b.iter(|| {
                let v = registry.instance::<$ty>().unwrap();
                black_box(&v.data);
            })
        });

        group.finish();
    }};
}

fn bench_eager(c: &mut Criterion) {
    bench_policy!(c, "singleton_eager", EagerService);
}

fn bench_locked(c: &mut Criterion) {
    bench_policy!(c, "singleton_locked", LockedService);
}

fn bench_lazy(c: &mut Criterion) {
    bench_policy!(c, "singleton_lazy", LazyService);
}

criterion_group!(benches, bench_eager, bench_locked, bench_lazy);
criterion_main!(benches);
