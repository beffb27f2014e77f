use criterion::{criterion_group, criterion_main};


use blotter::churn::register_benchmarks as register_churn_benchmarks;
use blotter::prices::register_benchmarks as register_price_benchmarks;

criterion_group!(
    benches,
    register_churn_benchmarks,
    register_price_benchmarks,
);

criterion_main!(benches);
