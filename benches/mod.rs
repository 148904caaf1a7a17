use criterion::{criterion_group, criterion_main};


use history::register_benchmarks as register_history_benchmarks;
use reconcile::register_benchmarks as register_reconcile_benchmarks;

// Define the benchmark groups
criterion_group!(
    benches,
    register_reconcile_benchmarks,
    register_history_benchmarks,
);

criterion_main!(benches);
