// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Derived metrics and uncertainty propagation.
//!
//! A derived metric is a fixed transform of a measured time, for example
//! GFLOP/s = work / time. Timing dispersion is carried through the
//! transform in one of two ways:
//!
//! - **relative**: a single symmetric error `|throughput · d / t|`;
//! - **asymmetric**: throughput evaluated at `t - d` and `t + d`, giving
//!   separate lower and upper deviations. Because throughput is the
//!   reciprocal of time these are not equal.
//!
//! Nothing here fails. A missing dispersion or a non-positive time gives a
//! [`Derived`] value with [`Uncertainty::None`].

use std::fmt;
use std::str::FromStr;

use perfgrid_table::types::GridError;

/// Floor applied to every divisor.
pub const EPSILON: f64 = 1e-12;

/// Dispersion/time ratio above which [`ErrorMode::Auto`] switches to
/// asymmetric bounds.
pub const ASYMMETRIC_THRESHOLD: f64 = 0.05;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    #[default]
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    #[must_use]
    pub fn to_seconds(self, value: f64) -> f64 {
        match self {
            TimeUnit::Seconds => value,
            TimeUnit::Milliseconds => value / 1e3,
            TimeUnit::Microseconds => value / 1e6,
            TimeUnit::Nanoseconds => value / 1e9,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "s" => Ok(TimeUnit::Seconds),
            "ms" => Ok(TimeUnit::Milliseconds),
            "us" | "µs" => Ok(TimeUnit::Microseconds),
            "ns" => Ok(TimeUnit::Nanoseconds),
            _ => Err(GridError::Invalid(format!("unknown time unit '{s}'"))),
        }
    }
}

/// A central time and its dispersion, both in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    pub time: f64,
    pub dispersion: Option<f64>,
}

impl Timing {
    #[must_use]
    pub fn new(time: f64, dispersion: Option<f64>) -> Self {
        Self { time, dispersion }
    }

    /// Build a timing from values expressed in `unit`.
    #[must_use]
    pub fn in_unit(time: f64, dispersion: Option<f64>, unit: TimeUnit) -> Self {
        Self {
            time: unit.to_seconds(time),
            dispersion: dispersion.map(|d| unit.to_seconds(d)),
        }
    }

    /// `d / t`, or `None` when it is not defined. Negative dispersions
    /// count as absent.
    #[must_use]
    pub fn relative_dispersion(&self) -> Option<f64> {
        match self.dispersion {
            Some(d) if d >= 0.0 && self.time > 0.0 => Some(d / self.time),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Uncertainty {
    None,
    Symmetric(f64),
    Asymmetric { lower: f64, upper: f64 },
}

impl Uncertainty {
    #[must_use]
    pub fn lower(&self) -> Option<f64> {
        match self {
            Uncertainty::None => None,
            Uncertainty::Symmetric(e) => Some(*e),
            Uncertainty::Asymmetric { lower, .. } => Some(*lower),
        }
    }

    #[must_use]
    pub fn upper(&self) -> Option<f64> {
        match self {
            Uncertainty::None => None,
            Uncertainty::Symmetric(e) => Some(*e),
            Uncertainty::Asymmetric { upper, .. } => Some(*upper),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Derived {
    pub value: f64,
    pub uncertainty: Uncertainty,

    /// The propagation mode actually used. Never [`ErrorMode::Auto`].
    pub mode: ErrorMode,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorMode {
    Relative,
    Asymmetric,
    #[default]
    Auto,
}

impl FromStr for ErrorMode {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relative" => Ok(ErrorMode::Relative),
            "asymmetric" => Ok(ErrorMode::Asymmetric),
            "auto" => Ok(ErrorMode::Auto),
            _ => Err(GridError::Invalid(format!(
                "unknown error mode '{s}' (expected relative, asymmetric or auto)"
            ))),
        }
    }
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorMode::Relative => write!(f, "relative"),
            ErrorMode::Asymmetric => write!(f, "asymmetric"),
            ErrorMode::Auto => write!(f, "auto"),
        }
    }
}

/// `time_a / time_b` with its propagated error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ratio {
    pub value: f64,
    pub relative_error: f64,
    pub error: f64,
}

/// Combine independent relative errors in quadrature. Absent terms count as
/// zero.
#[must_use]
pub fn combine_relative_errors(errors: &[Option<f64>]) -> f64 {
    errors
        .iter()
        .map(|e| e.unwrap_or(0.0))
        .map(|e| e * e)
        .sum::<f64>()
        .sqrt()
}

#[derive(Clone, Debug, PartialEq)]
pub struct DerivedMetricEngine {
    epsilon: f64,
    log_axis: bool,
    asymmetric_threshold: f64,
}

impl Default for DerivedMetricEngine {
    fn default() -> Self {
        Self {
            epsilon: EPSILON,
            log_axis: false,
            asymmetric_threshold: ASYMMETRIC_THRESHOLD,
        }
    }
}

impl DerivedMetricEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Results will be drawn against a log-scaled axis.
    #[must_use]
    pub fn with_log_axis(mut self, log_axis: bool) -> Self {
        self.log_axis = log_axis;
        self
    }

    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    #[must_use]
    pub fn throughput(&self, work: f64, time: f64) -> f64 {
        work / time.max(self.epsilon)
    }

    /// Symmetric error `|throughput · d / t|`.
    #[must_use]
    pub fn relative_error(&self, work: f64, timing: Timing) -> Derived {
        let value = self.throughput(work, timing.time);
        let uncertainty = match timing.relative_dispersion() {
            Some(rel) => Uncertainty::Symmetric((value * rel).abs()),
            None => Uncertainty::None,
        };
        Derived {
            value,
            uncertainty,
            mode: ErrorMode::Relative,
        }
    }

    /// Separate lower and upper deviations from evaluating the throughput at
    /// `t + d` and `t - d`.
    #[must_use]
    pub fn asymmetric_bounds(&self, work: f64, timing: Timing) -> Derived {
        let value = self.throughput(work, timing.time);
        let uncertainty = match timing.dispersion {
            Some(d) if d >= 0.0 && timing.time > 0.0 => {
                let time_lo = (timing.time - d).max(self.epsilon);
                let time_hi = (timing.time + d).max(self.epsilon);
                let throughput_hi = work / time_lo;
                let throughput_lo = work / time_hi;
                Uncertainty::Asymmetric {
                    lower: value - throughput_lo,
                    upper: throughput_hi - value,
                }
            }
            _ => Uncertainty::None,
        };
        Derived {
            value,
            uncertainty,
            mode: ErrorMode::Asymmetric,
        }
    }

    /// Replace [`ErrorMode::Auto`] by the mode to use for `timing`.
    #[must_use]
    pub fn resolve_mode(&self, mode: ErrorMode, timing: Timing) -> ErrorMode {
        match mode {
            ErrorMode::Auto => {
                let large = timing
                    .relative_dispersion()
                    .is_some_and(|rel| rel > self.asymmetric_threshold);
                if self.log_axis || large {
                    ErrorMode::Asymmetric
                } else {
                    ErrorMode::Relative
                }
            }
            explicit => explicit,
        }
    }

    #[must_use]
    pub fn derive(&self, work: f64, timing: Timing, mode: ErrorMode) -> Derived {
        match self.resolve_mode(mode, timing) {
            ErrorMode::Asymmetric => self.asymmetric_bounds(work, timing),
            _ => self.relative_error(work, timing),
        }
    }

    /// `a / b` with both operands' relative errors combined in quadrature.
    #[must_use]
    pub fn ratio(&self, a: Timing, b: Timing) -> Ratio {
        let value = a.time / b.time.max(self.epsilon);
        let relative_error =
            combine_relative_errors(&[a.relative_dispersion(), b.relative_dispersion()]);
        Ratio {
            value,
            relative_error,
            error: (value * relative_error).abs(),
        }
    }
}
