use super::{SECURITIES, request};
use criterion::{BenchmarkId, Criterion};
use rfq_blotter::{Blotter, BlotterConfig};
use std::hint::black_box;

fn populated(count: usize, interval_ms: u64) -> Blotter {
    let config = BlotterConfig::default()
        .with_limit(rfq_blotter::AssetType::SpotFx, -1)
        .with_price_update_interval(interval_ms);
    let mut blotter = Blotter::new(config);
    for i in 0..count {
        blotter.on_new_quote_request(request(i));
    }
    blotter
}

/// Register immediate versus batched price update benchmarks.
pub fn register_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("Blotter - Prices");

    for &count in &[100, 1_000] {
        group.bench_with_input(
            BenchmarkId::new("immediate_updates", count),
            &count,
            |b, &count| {
                b.iter_with_setup(
                    || populated(count, 0),
                    |mut blotter| {
                        for tick in 0..100 {
                            let security = SECURITIES[tick % SECURITIES.len()];
                            let bid = 1.0 + tick as f64 * 0.0001;
                            black_box(blotter.on_security_price_update(
                                security,
                                Some(bid),
                                Some(bid + 0.0002),
                            ));
                        }
                    },
                );
            },
        );

        group.bench_with_input(
            BenchmarkId::new("batched_flush", count),
            &count,
            |b, &count| {
                b.iter_with_setup(
                    || populated(count, 100),
                    |mut blotter| {
                        for tick in 0..100 {
                            let security = SECURITIES[tick % SECURITIES.len()];
                            let bid = 1.0 + tick as f64 * 0.0001;
                            blotter.on_security_price_update(security, Some(bid), Some(bid + 0.0002));
                        }
                        black_box(blotter.flush_price_updates())
                    },
                );
            },
        );
    }

    group.finish();
}
