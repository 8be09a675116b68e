// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use approx::assert_relative_eq;
use perfgrid_synth::grid::Estimator;
use perfgrid_synth::saturation::{
    DEFAULT_THREAD_TARGETS, LatencyCalibration, SaturationSynthesizer, ThreadPoint,
};
use perfgrid_synth::{FitConfig, Provenance};

fn point(threads: f64, bandwidth: f64, latency: f64) -> ThreadPoint {
    ThreadPoint {
        threads,
        bandwidth,
        latency,
    }
}

#[test]
fn prior_without_measurements() {
    let rows = SaturationSynthesizer::new(FitConfig::default()).synthesize(&[]);
    assert_eq!(rows.len(), DEFAULT_THREAD_TARGETS.len());

    let calibration = LatencyCalibration::default();
    for (row, t) in rows.iter().zip(DEFAULT_THREAD_TARGETS) {
        assert_eq!(row.axis, t);
        assert_eq!(row.stratum, None);
        assert_eq!(row.provenance, Provenance::Synthesized);
        assert_eq!(row.estimator, Estimator::Prior);
        assert_eq!(row.bandwidth, 52000.0 * (1.0 - (-0.12 * t).exp()));
        assert_eq!(row.latency, calibration.latency(row.bandwidth));
    }
}

#[test]
fn measured_threads_pass_through() {
    let measured = [point(32.0, 41000.0, 71.5), point(4.0, 18000.0, 88.0)];
    let rows = SaturationSynthesizer::new(FitConfig::default()).synthesize(&measured);
    assert_eq!(rows.len(), DEFAULT_THREAD_TARGETS.len());

    let at = |t: f64| rows.iter().find(|r| r.axis == t).unwrap();
    assert_eq!(at(32.0).bandwidth, 41000.0);
    assert_eq!(at(32.0).latency, 71.5);
    assert_eq!(at(32.0).provenance, Provenance::Measured);
    assert_eq!(at(4.0).bandwidth, 18000.0);
    assert_eq!(at(4.0).provenance, Provenance::Measured);

    // Curve through the 32-thread reference approaches 41000 * 1.05
    let t16 = at(16.0);
    assert_eq!(t16.provenance, Provenance::Synthesized);
    assert_eq!(t16.estimator, Estimator::Saturation);
    assert!(t16.bandwidth < 41000.0 && t16.bandwidth > 18000.0);
    assert_relative_eq!(
        t16.latency,
        120.0 - 10.0 * t16.bandwidth.log10(),
        epsilon = 1e-9
    );
}

#[test]
fn configured_ceiling() {
    let measured = [point(8.0, 20000.0, 90.0)];
    let synthesizer = SaturationSynthesizer::new(FitConfig::default())
        .with_ceiling(Some(40000.0))
        .with_targets(&[1.0, 8.0, 64.0]);
    let (model, estimator) = synthesizer.model_for(&measured);
    assert_eq!(estimator, Estimator::Saturation);
    assert_eq!(model.bw_max, 40000.0);
    assert_relative_eq!(model.k, 2.0_f64.ln() / 8.0);

    let rows = synthesizer.synthesize(&measured);
    assert_eq!(rows.len(), 3);
    assert_relative_eq!(rows[2].bandwidth, 40000.0, max_relative = 1e-2);
}

#[test]
fn off_grid_threads_are_left_out_by_default() {
    let measured = [point(3.0, 12000.0, 95.0), point(8.0, 30000.0, 80.0)];
    let rows = SaturationSynthesizer::new(FitConfig::default()).synthesize(&measured);
    assert_eq!(rows.len(), DEFAULT_THREAD_TARGETS.len());
    assert!(rows.iter().all(|r| r.axis != 3.0));
    assert_eq!(rows[3].provenance, Provenance::Measured);
    assert_eq!(rows[2].provenance, Provenance::Synthesized);
}

#[test]
fn off_grid_threads_on_request() {
    let config = FitConfig {
        include_measured_points: true,
        ..FitConfig::default()
    };
    let measured = [point(3.0, 12000.0, 95.0)];
    let rows = SaturationSynthesizer::new(config).synthesize(&measured);
    assert_eq!(rows.len(), DEFAULT_THREAD_TARGETS.len() + 1);
    assert_eq!(rows[2].axis, 3.0);
    assert_eq!(rows[2].provenance, Provenance::Measured);
}
