use std::hint::black_box;

use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use lq_endpoints::EndpointRegistry;
use lq_endpoints::Operation;

fn bench_lookup_bare_name(c: &mut Criterion) {
    let registry = EndpointRegistry::liqi();

    c.bench_function("lookup_bare_name", |b| {
        b.iter(|| registry.lookup(black_box("fetchOrderBook")));
    });
}

fn bench_lookup_aliases(c: &mut Criterion) {
    let registry = EndpointRegistry::liqi();
    let keys: Vec<String> = registry.iter().flat_map(|d| [d.camel_key(), d.snake_key()]).collect();

    c.bench_function("lookup_all_aliases", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(registry.lookup(black_box(key)));
            }
        });
    });
}

fn bench_get_by_operation(c: &mut Criterion) {
    let registry = EndpointRegistry::liqi();

    c.bench_function("get_by_operation", |b| {
        b.iter(|| {
            for op in Operation::ALL {
                black_box(registry.get(black_box(op)));
            }
        });
    });
}

criterion_group!(benches, bench_lookup_bare_name, bench_lookup_aliases, bench_get_by_operation);
criterion_main!(benches);
