use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use modref::{new_shared_registry, ChunkExport, ModuleReference, ReferenceRegistry, Resolver, StaticLoader};

/// Registry with N modules, each exporting `default` and `named`
fn populated_registry(n: usize) -> ReferenceRegistry<String> {
    let registry = ReferenceRegistry::new();
    for i in 0..n {
        let module_id = format!("Module{}.tsx", i);
        registry.register(&module_id, "default", format!("component-{}", i));
        registry.register(&module_id, "named", format!("named-{}", i));
    }
    registry
}

/// Direct registry lookups at increasing registry sizes
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_lookup");

    for module_count in [10, 100, 1000, 10000].iter() {
        let registry = populated_registry(*module_count);
        let middle = format!("Module{}.tsx", module_count / 2);

        group.bench_with_input(
            BenchmarkId::new("hit", module_count),
            module_count,
            |b, _| {
                b.iter(|| {
                    let value = registry.lookup(black_box(&middle), black_box("default"));
                    black_box(value)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("unknown_module", module_count),
            module_count,
            |b, _| {
                b.iter(|| {
                    let value = registry.lookup(black_box("Missing.tsx"), black_box("default"));
                    black_box(value)
                });
            },
        );
    }

    group.finish();
}

/// Deferred exports pay for initialization once, then read the cached value
fn bench_lazy_lookup(c: &mut Criterion) {
    let registry = ReferenceRegistry::new();
    registry.register_lazy("Clock.tsx", "Clock", || "ClockComponent".repeat(64));
    // Warm the cell
    let _ = registry.lookup("Clock.tsx", "Clock");

    c.bench_function("registry_lookup/lazy_evaluated", |b| {
        b.iter(|| black_box(registry.lookup(black_box("Clock.tsx"), black_box("Clock"))));
    });
}

/// Resolving a reference whose chunks are already loaded
fn bench_resolve_loaded(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_loaded");
    let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");

    for chunk_count in [0usize, 1, 4, 16].iter() {
        let chunks: Vec<String> = (0..*chunk_count).map(|i| format!("chunk-{}", i)).collect();
        let mut loader = StaticLoader::new();
        for chunk in &chunks {
            loader.insert_chunk(chunk.as_str());
        }

        let registry = new_shared_registry();
        registry.register_export(ChunkExport::new("Clock.tsx", "Clock", "ClockComponent".to_string()));
        let resolver = Resolver::new(Arc::clone(&registry), loader);
        let reference = ModuleReference::new("Clock.tsx", "Clock", chunks);

        // Setup: load every chunk once so the benchmark measures the fast path
        runtime
            .block_on(resolver.resolve(&reference))
            .expect("Failed to resolve");

        group.bench_with_input(
            BenchmarkId::new("chunks", chunk_count),
            chunk_count,
            |b, _| {
                b.iter(|| {
                    let value = runtime.block_on(resolver.resolve(black_box(&reference)));
                    black_box(value)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_lazy_lookup, bench_resolve_loaded);
criterion_main!(benches);
