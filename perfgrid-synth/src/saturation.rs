// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Bandwidth saturation over thread count.
//!
//! Bandwidth follows `bw_max · (1 − e^{−k·T})`. `k` is solved analytically
//! from the measurement at the largest thread count. Latency is derived
//! from bandwidth as `a − b·ln(bandwidth)`: queueing latency falls
//! log-linearly as bandwidth approaches saturation.

use log::{debug, info};

use crate::grid::{Estimator, GridRow};
use crate::{FitConfig, Provenance, build_axis, is_close};

/// Default target thread counts.
pub const DEFAULT_THREAD_TARGETS: [f64; 6] = [1.0, 2.0, 4.0, 8.0, 16.0, 32.0];

/// Fraction added to the largest observed bandwidth when no ceiling is
/// configured.
pub const DEFAULT_SATURATION_MARGIN: f64 = 0.05;

const MIN_RATE: f64 = 1e-3;
const MIN_HEADROOM: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq)]
pub struct ThreadPoint {
    pub threads: f64,
    pub bandwidth: f64,
    pub latency: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaturationModel {
    pub bw_max: f64,
    pub k: f64,
}

impl SaturationModel {
    /// Used when there are no measurements.
    pub const PRIOR: SaturationModel = SaturationModel {
        bw_max: 52000.0,
        k: 0.12,
    };

    /// Fit to `points`, which must not be empty.
    ///
    /// `bw_max` is `ceiling` when given, otherwise the largest observed
    /// bandwidth scaled by `1 + margin`.
    #[must_use]
    pub fn fit(points: &[ThreadPoint], margin: f64, ceiling: Option<f64>) -> Self {
        let observed_max = points
            .iter()
            .map(|p| p.bandwidth)
            .fold(f64::NEG_INFINITY, f64::max);
        let bw_max = ceiling.unwrap_or(observed_max * (1.0 + margin));

        // Reference is the first point at the largest thread count
        let reference = points
            .iter()
            .reduce(|best, p| if p.threads > best.threads { p } else { best });
        let k = match reference {
            Some(r) => {
                let headroom = (1.0 - r.bandwidth / bw_max).max(MIN_HEADROOM);
                (-headroom.ln() / r.threads.max(1.0)).max(MIN_RATE)
            }
            None => Self::PRIOR.k,
        };
        debug!("saturation fit bw_max={bw_max} k={k}");
        Self { bw_max, k }
    }

    #[must_use]
    pub fn predict(&self, threads: f64) -> f64 {
        self.bw_max * (1.0 - (-self.k * threads).exp())
    }
}

/// `latency = a − b·ln(max(bandwidth, 1))`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencyCalibration {
    pub a: f64,
    pub b: f64,
}

impl Default for LatencyCalibration {
    fn default() -> Self {
        Self {
            a: 120.0,
            b: 10.0 / std::f64::consts::LN_10,
        }
    }
}

impl LatencyCalibration {
    #[must_use]
    pub fn latency(&self, bandwidth: f64) -> f64 {
        self.a - self.b * bandwidth.max(1.0).ln()
    }
}

#[derive(Clone, Debug)]
pub struct SaturationSynthesizer {
    config: FitConfig,
    targets: Vec<f64>,
    margin: f64,
    ceiling: Option<f64>,
    calibration: LatencyCalibration,
}

impl SaturationSynthesizer {
    #[must_use]
    pub fn new(config: FitConfig) -> Self {
        Self {
            config,
            targets: DEFAULT_THREAD_TARGETS.to_vec(),
            margin: DEFAULT_SATURATION_MARGIN,
            ceiling: None,
            calibration: LatencyCalibration::default(),
        }
    }

    #[must_use]
    pub fn with_targets(mut self, targets: &[f64]) -> Self {
        self.targets = build_axis(targets, &[], false);
        self
    }

    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Known bandwidth ceiling. Overrides the margin.
    #[must_use]
    pub fn with_ceiling(mut self, ceiling: Option<f64>) -> Self {
        self.ceiling = ceiling;
        self
    }

    #[must_use]
    pub fn with_calibration(mut self, calibration: LatencyCalibration) -> Self {
        self.calibration = calibration;
        self
    }

    #[must_use]
    pub fn model_for(&self, points: &[ThreadPoint]) -> (SaturationModel, Estimator) {
        if points.is_empty() {
            info!("no thread measurements, using the prior saturation model");
            return (SaturationModel::PRIOR, Estimator::Prior);
        }
        (
            SaturationModel::fit(points, self.margin, self.ceiling),
            Estimator::Saturation,
        )
    }

    /// Complete the thread axis. Measured thread counts pass through.
    #[must_use]
    pub fn synthesize(&self, measured: &[ThreadPoint]) -> Vec<GridRow> {
        let points: Vec<ThreadPoint> = measured
            .iter()
            .filter(|p| {
                let ok = p.threads > 0.0 && p.bandwidth.is_finite() && p.latency.is_finite();
                if !ok {
                    debug!("ignoring unusable point {p:?}");
                }
                ok
            })
            .cloned()
            .collect();

        let (model, estimator) = self.model_for(&points);
        let threads: Vec<f64> = points.iter().map(|p| p.threads).collect();
        let axis = build_axis(&self.targets, &threads, self.config.include_measured_points);
        for t in &threads {
            if !axis.iter().any(|a| is_close(*a, *t)) {
                info!("measured point at {t} threads is not on the output axis");
            }
        }

        axis.into_iter()
            .map(|t| match points.iter().find(|p| is_close(t, p.threads)) {
                Some(p) => GridRow {
                    stratum: None,
                    axis: t,
                    bandwidth: p.bandwidth,
                    latency: p.latency,
                    provenance: Provenance::Measured,
                    estimator,
                },
                None => {
                    let bandwidth = model.predict(t);
                    GridRow {
                        stratum: None,
                        axis: t,
                        bandwidth,
                        latency: self.calibration.latency(bandwidth),
                        provenance: Provenance::Synthesized,
                        estimator,
                    }
                }
            })
            .collect()
    }
}
