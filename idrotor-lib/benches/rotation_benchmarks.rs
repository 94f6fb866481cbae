//! Rotation and intercepted-read benchmarks
//!
//! Intercepted reads run on arbitrary host threads, so `current()` and a
//! redirected dispatch call need to stay cheap.
//!
//! Run with: `cargo bench --bench rotation_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use idrotor_lib::interception::{
    DispatchTableBackend, EntryPointKind, InterceptionLayer, NativeDispatchTable, NativeValue,
};
use idrotor_lib::rotation::IdentifierStore;
use idrotor_lib::IdentifierGenerator;
use std::sync::Arc;

/// Benchmark identifier generation from the OS entropy source
fn bench_generate(c: &mut Criterion) {
    let generator = IdentifierGenerator::os();
    c.bench_function("identifier_generate", |b| {
        b.iter(|| black_box(generator.generate().unwrap()))
    });
}

/// Benchmark snapshot reads
fn bench_current(c: &mut Criterion) {
    let store = IdentifierStore::with_defaults();
    store.initialize().unwrap();
    c.bench_function("store_current", |b| {
        b.iter(|| black_box(store.current().unwrap()))
    });
}

/// Benchmark rotation (generate + swap)
fn bench_rotate(c: &mut Criterion) {
    let store = IdentifierStore::with_defaults();
    store.initialize().unwrap();
    c.bench_function("store_rotate", |b| {
        b.iter(|| black_box(store.rotate().unwrap()))
    });
}

/// Benchmark a native call through a redirected slot
fn bench_intercepted_read(c: &mut Criterion) {
    let table = Arc::new(NativeDispatchTable::new());
    let symbol = EntryPointKind::VendorIdentifier.entry_point().symbol();
    table.register(&symbol, Arc::new(|| NativeValue::Uuid(None)));

    let store = Arc::new(IdentifierStore::with_defaults());
    store.initialize().unwrap();
    InterceptionLayer::new(store, Arc::new(DispatchTableBackend::new(table.clone()))).install();

    c.bench_function("intercepted_read", |b| {
        b.iter(|| black_box(table.call(&symbol)))
    });
}

criterion_group!(
    benches,
    bench_generate,
    bench_current,
    bench_rotate,
    bench_intercepted_read
);
criterion_main!(benches);
