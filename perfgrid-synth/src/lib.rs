// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Dense grids from sparse benchmark measurements.
//!
//! Measurements are partitioned into strata (for example one access
//! pattern each). Every stratum is completed onto a fixed, ascending set of
//! target axis points:
//!
//! - targets that coincide with a measurement take the measured value
//!   unchanged and are tagged [`Provenance::Measured`];
//! - all other targets take a model prediction and are tagged
//!   [`Provenance::Synthesized`].
//!
//! A stratum with too few measurements is filled entirely from a documented
//! prior model. The output has exactly one row per (stratum, target) and is
//! bit-identical between runs on the same input.
//!
//! - [`stride`]: hyperbolic bandwidth and log-linear latency over stride.
//! - [`saturation`]: exponential bandwidth saturation over thread count.
//! - [`grid`]: the output rows and their tabular form.

use std::fmt;
use std::str::FromStr;

use perfgrid_table::grid_error;
use perfgrid_table::types::{GridError, GridResult};

pub mod grid;
pub mod saturation;
pub mod stride;

/// Absolute tolerance used when matching a target to a measured point.
pub const MATCH_ABS_TOLERANCE: f64 = 1e-8;

/// Relative tolerance used when matching a target to a measured point.
pub const MATCH_REL_TOLERANCE: f64 = 1e-5;

/// `|a - b| <= 1e-8 + 1e-5 * |b|`
#[must_use]
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= MATCH_ABS_TOLERANCE + MATCH_REL_TOLERANCE * b.abs()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    Measured,
    Synthesized,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Provenance::Measured => write!(f, "measured"),
            Provenance::Synthesized => write!(f, "synthesized"),
        }
    }
}

/// What the hyperbolic bandwidth fit is scored against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FitScoring {
    /// Squared error at the measured strides.
    MeasuredPoints,

    /// Squared error at the target strides inside the measured range,
    /// against the measured curve linearly interpolated onto them.
    #[default]
    InterpolatedTargets,
}

impl FromStr for FitScoring {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "measured" => Ok(FitScoring::MeasuredPoints),
            "interpolated" => Ok(FitScoring::InterpolatedTargets),
            _ => Err(GridError::Invalid(format!(
                "unknown fit scoring '{s}' (expected measured or interpolated)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FitConfig {
    /// Number of evenly spaced `β` candidates in the bandwidth grid search.
    pub grid_steps: usize,

    /// Strata with fewer measured points use the prior model.
    pub min_points_for_fit: usize,

    /// Floor applied to divisors.
    pub epsilon: f64,

    pub scoring: FitScoring,

    /// Add measured axis points that are not targets to the output axis.
    pub include_measured_points: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            grid_steps: 30,
            min_points_for_fit: 2,
            epsilon: 1e-12,
            scoring: FitScoring::default(),
            include_measured_points: false,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> GridResult {
        if self.grid_steps == 0 {
            return grid_error!("grid_steps must be at least 1");
        }
        if self.epsilon.is_nan() || self.epsilon <= 0.0 {
            return grid_error!(format!("epsilon must be positive, got {}", self.epsilon));
        }
        Ok(())
    }

    /// A stratum with `num_points` measurements is fitted rather than filled
    /// from the prior.
    #[must_use]
    pub fn can_fit(&self, num_points: usize) -> bool {
        num_points > 0 && num_points >= self.min_points_for_fit
    }
}

/// Ascending, de-duplicated axis made of `targets` plus, when requested, any
/// `measured` points not already close to a target.
#[must_use]
pub fn build_axis(targets: &[f64], measured: &[f64], include_measured: bool) -> Vec<f64> {
    let mut axis = targets.to_vec();
    if include_measured {
        for m in measured {
            if !axis.iter().any(|a| is_close(*a, *m)) {
                axis.push(*m);
            }
        }
    }
    axis.sort_by(f64::total_cmp);
    axis.dedup_by(|a, b| is_close(*a, *b));
    axis
}
