// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use criterion::{Criterion, criterion_group, criterion_main};
use perfgrid_synth::FitConfig;
use perfgrid_synth::stride::{DEFAULT_STRIDE_TARGETS, StridePoint, StrideSynthesizer, fit_hyperbolic};

fn measurements() -> Vec<StridePoint> {
    let mut points = Vec::new();
    for (stratum, alpha, beta) in [("seq", 5_000_000.0, 64.0), ("rand", 2_000_000.0, 192.0)] {
        for stride in [64.0, 96.0, 128.0, 256.0, 384.0, 512.0, 1024.0, 4096.0] {
            points.push(StridePoint {
                stratum: stratum.to_string(),
                stride,
                bandwidth: alpha / (beta + stride),
                latency: 90.0 + 6.0 * f64::log2(stride),
            });
        }
    }
    points
}

fn bench_stride_fit(c: &mut Criterion) {
    let points = measurements();
    let mut group = c.benchmark_group("stride_fit");

    for grid_steps in [30, 300] {
        let config = FitConfig {
            grid_steps,
            ..FitConfig::default()
        };
        group.bench_function(format!("hyperbolic_{grid_steps}"), |b| {
            b.iter(|| fit_hyperbolic(&points[..8], &DEFAULT_STRIDE_TARGETS, &config));
        });
    }

    let synthesizer = StrideSynthesizer::new(FitConfig::default());
    group.bench_function("synthesize", |b| {
        b.iter(|| synthesizer.synthesize(&points));
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = bench_stride_fit
}
criterion_main!(benches);
