// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Bandwidth and latency over access stride.
//!
//! Per stratum (access pattern) with enough measurements:
//!
//! - bandwidth follows `α / (β + S)`. `β` is chosen by grid search over a
//!   fixed, ordered list of candidates, refined on successively narrower
//!   grids around the best one. For each candidate `α` is the closed-form
//!   least-squares projection `(X·y)/(X·X)` with `X = 1/(β + S)`. The first
//!   candidate with the lowest mean squared error wins.
//! - latency follows `c + d·log2(S)`, fitted by ordinary least squares.
//!
//! Strata with too few measurements are filled from a [`StridePrior`].

use log::{debug, info};

use crate::grid::{Estimator, GridRow};
use crate::{FitConfig, FitScoring, Provenance, build_axis, is_close};

/// Default access-pattern strata.
pub const DEFAULT_STRATA: [&str; 2] = ["seq", "rand"];

/// Default target strides in bytes.
pub const DEFAULT_STRIDE_TARGETS: [f64; 7] = [64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0];

/// A complete stride measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct StridePoint {
    pub stratum: String,
    pub stride: f64,
    pub bandwidth: f64,
    pub latency: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HyperbolicModel {
    pub alpha: f64,
    pub beta: f64,
}

impl HyperbolicModel {
    #[must_use]
    pub fn predict(&self, stride: f64) -> f64 {
        self.alpha / (self.beta + stride)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogLinearModel {
    pub intercept: f64,
    pub slope: f64,
}

impl LogLinearModel {
    #[must_use]
    pub fn predict(&self, stride: f64) -> f64 {
        self.intercept + self.slope * stride.log2()
    }
}

/// Fallback model for strata without enough measurements:
///
/// - `bandwidth(S) = max(base_bandwidth / (1 + S/128) + offset, 0)`
/// - `latency(S) = base_latency + 8·log2(S/64)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StridePrior {
    pub base_bandwidth: f64,
    pub offset: f64,
    pub base_latency: f64,
}

impl StridePrior {
    pub const SEQ: StridePrior = StridePrior {
        base_bandwidth: 20000.0,
        offset: 0.0,
        base_latency: 100.0,
    };

    pub const RAND: StridePrior = StridePrior {
        base_bandwidth: 15000.0,
        offset: -3000.0,
        base_latency: 110.0,
    };

    /// Prior for a named stratum. Unknown strata use the sequential prior.
    #[must_use]
    pub fn for_stratum(stratum: &str) -> Self {
        match stratum {
            "seq" => Self::SEQ,
            "rand" => Self::RAND,
            other => {
                info!("no prior for stratum '{other}', using the 'seq' prior");
                Self::SEQ
            }
        }
    }

    #[must_use]
    pub fn bandwidth(&self, stride: f64) -> f64 {
        (self.base_bandwidth / (1.0 + stride / 128.0) + self.offset).max(0.0)
    }

    #[must_use]
    pub fn latency(&self, stride: f64) -> f64 {
        self.base_latency + 8.0 * (stride / 64.0).log2()
    }
}

/// Number of times the `β` search is repeated on a narrower interval
/// around the current best candidate.
pub const REFINE_ROUNDS: usize = 16;

/// `β` search interval: `max(1, min/2)` to `2·max` of `strides`.
#[must_use]
pub fn beta_bounds(strides: &[f64]) -> (f64, f64) {
    let min = strides.iter().copied().fold(f64::INFINITY, f64::min);
    let max = strides.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    ((min / 2.0).max(1.0), 2.0 * max)
}

/// `steps` evenly spaced values from `lo` to `hi`. The last value is
/// exactly `hi`.
fn linspace(lo: f64, hi: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (steps - 1) as f64;
            let mut values: Vec<f64> = (0..steps).map(|i| lo + step * i as f64).collect();
            values[steps - 1] = hi;
            values
        }
    }
}

/// `steps` evenly spaced values across [`beta_bounds`] of `strides`, in
/// ascending order. The last value is exactly the upper bound.
#[must_use]
pub fn beta_candidates(strides: &[f64], steps: usize) -> Vec<f64> {
    let (lo, hi) = beta_bounds(strides);
    linspace(lo, hi, steps)
}

/// Piecewise-linear interpolation of `(xs, ys)` at `x`, clamped to the end
/// values outside the measured range. `xs` must be ascending.
#[must_use]
pub fn interpolate(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    let upper = xs.partition_point(|v| *v <= x);
    let (x0, x1) = (xs[upper - 1], xs[upper]);
    let (y0, y1) = (ys[upper - 1], ys[upper]);
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Grid-search fit of `α / (β + S)` to `points`, which must not be empty.
///
/// The coarse search covers [`beta_candidates`]. It is then repeated
/// [`REFINE_ROUNDS`] times over one coarse step either side of the best
/// candidate so far. Every round uses a fixed, ordered candidate list and
/// keeps the first candidate with the lowest score.
///
/// `targets` is only used with [`FitScoring::InterpolatedTargets`]. Only
/// targets inside the measured stride range are scored; when there are
/// none, the measured points are scored instead.
#[must_use]
pub fn fit_hyperbolic(
    points: &[StridePoint],
    targets: &[f64],
    config: &FitConfig,
) -> HyperbolicModel {
    let mut sorted: Vec<&StridePoint> = points.iter().collect();
    sorted.sort_by(|a, b| a.stride.total_cmp(&b.stride));
    let xs: Vec<f64> = sorted.iter().map(|p| p.stride).collect();
    let ys: Vec<f64> = sorted.iter().map(|p| p.bandwidth).collect();
    if xs.is_empty() || config.grid_steps == 0 {
        return HyperbolicModel {
            alpha: 0.0,
            beta: 1.0,
        };
    }

    let measured: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
    let reference = match config.scoring {
        FitScoring::MeasuredPoints => measured,
        FitScoring::InterpolatedTargets => {
            let (first, last) = (xs[0], xs[xs.len() - 1]);
            let inside: Vec<(f64, f64)> = targets
                .iter()
                .filter(|t| {
                    (**t >= first && **t <= last) || is_close(**t, first) || is_close(**t, last)
                })
                .map(|t| (*t, interpolate(*t, &xs, &ys)))
                .collect();
            if inside.is_empty() {
                debug!("no targets inside [{first}, {last}], scoring measured points");
                measured
            } else {
                inside
            }
        }
    };

    let score = |beta: f64| -> (f64, HyperbolicModel) {
        let xx: Vec<f64> = xs.iter().map(|s| 1.0 / (beta + s)).collect();
        let xy: f64 = xx.iter().zip(&ys).map(|(x, y)| x * y).sum();
        let x2: f64 = xx.iter().map(|x| x * x).sum();
        let model = HyperbolicModel {
            alpha: xy / x2.max(config.epsilon),
            beta,
        };
        let mse = reference
            .iter()
            .map(|(s, y)| {
                let err = model.predict(*s) - y;
                err * err
            })
            .sum::<f64>()
            / reference.len() as f64;
        (mse, model)
    };
    let search = |candidates: Vec<f64>, best: Option<(f64, HyperbolicModel)>| {
        candidates.into_iter().fold(best, |best, beta| {
            let (mse, model) = score(beta);
            match best {
                Some((best_mse, _)) if mse >= best_mse => best,
                _ => Some((mse, model)),
            }
        })
    };

    let (lo, hi) = beta_bounds(&xs);
    let steps = config.grid_steps;
    let mut best = search(linspace(lo, hi, steps), None);
    if steps > 1 {
        let refine_steps = steps.max(5);
        let mut step = (hi - lo) / (steps - 1) as f64;
        for _ in 0..REFINE_ROUNDS {
            let Some((_, model)) = best else { break };
            let round_lo = (model.beta - step).max(lo);
            let round_hi = (model.beta + step).min(hi);
            if round_hi <= round_lo {
                break;
            }
            best = search(linspace(round_lo, round_hi, refine_steps), best);
            step = (round_hi - round_lo) / (refine_steps - 1) as f64;
        }
    }

    match best {
        Some((mse, model)) => {
            debug!(
                "hyperbolic fit alpha={} beta={} mse={mse}",
                model.alpha, model.beta
            );
            model
        }
        None => HyperbolicModel {
            alpha: 0.0,
            beta: 1.0,
        },
    }
}

/// Ordinary least squares of latency on `log2(stride)`. A single distinct
/// stride gives a flat line through the mean.
#[must_use]
pub fn fit_log_linear(points: &[StridePoint]) -> LogLinearModel {
    let n = points.len() as f64;
    let xs: Vec<f64> = points.iter().map(|p| p.stride.log2()).collect();
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.latency).sum::<f64>() / n;

    let sxx: f64 = xs.iter().map(|x| (x - mean_x) * (x - mean_x)).sum();
    let sxy: f64 = xs
        .iter()
        .zip(points)
        .map(|(x, p)| (x - mean_x) * (p.latency - mean_y))
        .sum();

    if sxx == 0.0 {
        return LogLinearModel {
            intercept: mean_y,
            slope: 0.0,
        };
    }
    let slope = sxy / sxx;
    LogLinearModel {
        intercept: mean_y - slope * mean_x,
        slope,
    }
}

/// How one stratum was completed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StrideModel {
    Fit {
        bandwidth: HyperbolicModel,
        latency: LogLinearModel,
    },
    Prior(StridePrior),
}

impl StrideModel {
    #[must_use]
    pub fn predict(&self, stride: f64) -> (f64, f64) {
        match self {
            StrideModel::Fit { bandwidth, latency } => {
                (bandwidth.predict(stride), latency.predict(stride))
            }
            StrideModel::Prior(prior) => (prior.bandwidth(stride), prior.latency(stride)),
        }
    }

    #[must_use]
    pub fn estimator(&self) -> Estimator {
        match self {
            StrideModel::Fit { .. } => Estimator::Fit,
            StrideModel::Prior(_) => Estimator::Prior,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StrideSynthesizer {
    config: FitConfig,
    strata: Vec<String>,
    targets: Vec<f64>,
}

impl StrideSynthesizer {
    #[must_use]
    pub fn new(config: FitConfig) -> Self {
        Self {
            config,
            strata: DEFAULT_STRATA.iter().map(|s| s.to_string()).collect(),
            targets: DEFAULT_STRIDE_TARGETS.to_vec(),
        }
    }

    /// Strata are emitted in the order given.
    #[must_use]
    pub fn with_strata(mut self, strata: &[&str]) -> Self {
        self.strata = strata.iter().map(|s| s.to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_targets(mut self, targets: &[f64]) -> Self {
        self.targets = build_axis(targets, &[], false);
        self
    }

    /// Choose the model for one stratum's points.
    #[must_use]
    pub fn model_for(&self, stratum: &str, points: &[StridePoint]) -> StrideModel {
        if !self.config.can_fit(points.len()) {
            info!(
                "stratum '{stratum}' has {} measured points (need {}), using prior",
                points.len(),
                self.config.min_points_for_fit
            );
            return StrideModel::Prior(StridePrior::for_stratum(stratum));
        }
        StrideModel::Fit {
            bandwidth: fit_hyperbolic(points, &self.targets, &self.config),
            latency: fit_log_linear(points),
        }
    }

    /// Complete every configured stratum onto the target strides.
    #[must_use]
    pub fn synthesize(&self, measured: &[StridePoint]) -> Vec<GridRow> {
        let usable: Vec<&StridePoint> = measured
            .iter()
            .filter(|p| {
                let ok = p.stride > 0.0
                    && p.stride.is_finite()
                    && p.bandwidth.is_finite()
                    && p.latency.is_finite();
                if !ok {
                    debug!("ignoring unusable point {p:?}");
                }
                ok
            })
            .collect();
        for p in &usable {
            if !self.strata.contains(&p.stratum) {
                info!(
                    "ignoring point in unconfigured stratum '{}' at stride {}",
                    p.stratum, p.stride
                );
            }
        }

        let mut rows = Vec::new();
        for stratum in &self.strata {
            let points: Vec<StridePoint> = usable
                .iter()
                .filter(|p| p.stratum == *stratum)
                .map(|p| (*p).clone())
                .collect();
            let model = self.model_for(stratum, &points);

            let passes_through = matches!(model, StrideModel::Fit { .. });
            let strides: Vec<f64> = points.iter().map(|p| p.stride).collect();
            let axis = build_axis(
                &self.targets,
                &strides,
                passes_through && self.config.include_measured_points,
            );
            for p in &points {
                if !axis.iter().any(|s| is_close(*s, p.stride)) {
                    info!(
                        "measured stride {} in stratum '{stratum}' is off the output axis",
                        p.stride
                    );
                }
            }

            for stride in axis {
                // First measurement at a stride wins
                let exact = passes_through
                    .then(|| points.iter().find(|p| is_close(stride, p.stride)))
                    .flatten();
                let row = match exact {
                    Some(p) => GridRow {
                        stratum: Some(stratum.clone()),
                        axis: stride,
                        bandwidth: p.bandwidth,
                        latency: p.latency,
                        provenance: Provenance::Measured,
                        estimator: model.estimator(),
                    },
                    None => {
                        let (bandwidth, latency) = model.predict(stride);
                        GridRow {
                            stratum: Some(stratum.clone()),
                            axis: stride,
                            bandwidth,
                            latency,
                            provenance: Provenance::Synthesized,
                            estimator: model.estimator(),
                        }
                    }
                };
                rows.push(row);
            }
        }
        rows
    }
}
