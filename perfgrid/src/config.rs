// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Layered configuration.
//!
//! Every setting can come from, in increasing priority:
//!
//! 1. the defaults in [`Config::default`];
//! 2. a `perfgrid.toml` file next to this source file (skipped if absent);
//! 3. an extra TOML file named by `--conf-file`;
//! 4. `PERFGRID_*` environment variables, e.g. `PERFGRID_GRID_STEPS=40`;
//! 5. command-line flags.
//!
//! An extra configuration file could look like:
//! ```toml
//! dataset = "stride"
//! input = "mlc_matrices.csv"
//! output = "mlc_gran_mix.csv"
//! grid_steps = 64
//! strata = ["seq", "rand"]
//! ```
//!
//! [`Config::settings`] validates the merged record and turns it into the
//! typed [`RunSettings`] the pipelines take. Nothing below this module reads
//! the environment.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use perfgrid_stats::aggregate::Centre;
use perfgrid_stats::derive::ErrorMode;
use perfgrid_synth::saturation::{DEFAULT_SATURATION_MARGIN, DEFAULT_THREAD_TARGETS};
use perfgrid_synth::stride::{DEFAULT_STRATA, DEFAULT_STRIDE_TARGETS};
use perfgrid_synth::{FitConfig, FitScoring};
use perfgrid_table::grid_error;
use perfgrid_table::types::{GridError, GridResult};
use serde::{Deserialize, Serialize};

const CONF_FILE_NAME: &str = "perfgrid.toml";
const ENV_PREFIX: &str = "PERFGRID_";

#[derive(Clone, Debug, Deserialize, Parser, PartialEq, Serialize)]
#[command(
    name = "perfgrid",
    version,
    about = "Aggregate benchmark trials, propagate timing uncertainty and complete sparse grids."
)]
pub struct Config {
    /// Dataset pipeline to run: kernels, stride or threads
    #[arg(long)]
    pub dataset: Option<String>,

    /// Input CSV
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output CSV
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Optional speedup CSV for the kernels dataset (empty to disable)
    #[arg(long)]
    pub speedup_output: Option<PathBuf>,

    /// Number of beta candidates in the bandwidth grid search
    #[arg(long)]
    pub grid_steps: Option<usize>,

    /// Strata with fewer complete points fall back to the prior model
    #[arg(long)]
    pub min_points_for_fit: Option<usize>,

    /// Floor applied to every divisor
    #[arg(long)]
    pub epsilon: Option<f64>,

    /// Score the bandwidth fit against measured points or interpolated
    /// targets: measured or interpolated
    #[arg(long)]
    pub fit_scoring: Option<String>,

    /// Add measured axis points that are not targets to the output grid
    #[arg(long)]
    pub include_measured_points: Option<bool>,

    /// Access-pattern strata, in output order
    #[arg(long, value_delimiter = ',')]
    pub strata: Option<Vec<String>>,

    /// Target strides in bytes
    #[arg(long, value_delimiter = ',')]
    pub stride_targets: Option<Vec<f64>>,

    /// Target thread counts
    #[arg(long, value_delimiter = ',')]
    pub thread_targets: Option<Vec<f64>>,

    /// Fraction added to the largest observed bandwidth to get the
    /// saturation ceiling
    #[arg(long)]
    pub saturation_margin: Option<f64>,

    /// Known bandwidth ceiling in MB/s (0 to derive it from measurements)
    #[arg(long)]
    pub bandwidth_ceiling: Option<f64>,

    /// Uncertainty propagation: relative, asymmetric or auto
    #[arg(long)]
    pub error_mode: Option<String>,

    /// Results are drawn against a log-scaled axis
    #[arg(long)]
    pub log_axis: Option<bool>,

    /// Central value of repeated trials: median or mean
    #[arg(long)]
    pub centre: Option<String>,

    /// Build used as the speedup numerator
    #[arg(long)]
    pub baseline_build: Option<String>,

    /// Build used as the speedup denominator
    #[arg(long)]
    pub candidate_build: Option<String>,

    /// Saved `lscpu` output used to classify working sets
    #[arg(long)]
    pub lscpu: Option<PathBuf>,

    /// YAML column-alias table replacing the built-in one
    #[arg(long)]
    pub aliases: Option<PathBuf>,

    /// Configure the logging level for the log messages
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to additional configuration file
    ///
    /// This additional configuration file must contain TOML, and set values
    /// for fields of this struct.
    #[arg(long)]
    pub conf_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let fit = FitConfig::default();
        Self {
            dataset: Some(Dataset::Kernels.to_string()),
            input: Some(Default::default()),
            output: Some(Default::default()),
            speedup_output: Some(Default::default()),
            grid_steps: Some(fit.grid_steps),
            min_points_for_fit: Some(fit.min_points_for_fit),
            epsilon: Some(fit.epsilon),
            fit_scoring: Some("interpolated".to_string()),
            include_measured_points: Some(fit.include_measured_points),
            strata: Some(DEFAULT_STRATA.iter().map(|s| s.to_string()).collect()),
            stride_targets: Some(DEFAULT_STRIDE_TARGETS.to_vec()),
            thread_targets: Some(DEFAULT_THREAD_TARGETS.to_vec()),
            saturation_margin: Some(DEFAULT_SATURATION_MARGIN),
            bandwidth_ceiling: Some(0.0),
            error_mode: Some(ErrorMode::Auto.to_string()),
            log_axis: Some(false),
            centre: Some("median".to_string()),
            baseline_build: Some("scalar".to_string()),
            candidate_build: Some("auto".to_string()),
            lscpu: Some(Default::default()),
            aliases: Some(Default::default()),
            log_level: Some("warn".to_string()),
            conf_file: Some(Default::default()),
        }
    }
}

impl Config {
    /// Merge every source, reading flags from the process command line.
    /// Exits with a usage message on invalid flags or `--help`.
    pub fn parse_all_sources() -> anyhow::Result<Self> {
        Self::from_cli(Self::parse())
    }

    /// As [`Config::parse_all_sources`] but with explicit arguments, and
    /// returning flag errors.
    pub fn try_parse_all_sources<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::from_cli(Self::try_parse_from(args)?)
    }

    fn from_cli(cli: Config) -> anyhow::Result<Self> {
        let mut config = Self::figment_to_config(None)?;
        config.clap_merge(&cli);

        let extra_conf_file = config.conf_file.clone().unwrap_or_default();
        config.parse_extra_conf_file(&extra_conf_file, &cli)?;
        Ok(config)
    }

    fn static_conf_file_path() -> PathBuf {
        let mut conf_file = PathBuf::from(file!());
        conf_file.set_file_name(CONF_FILE_NAME);
        conf_file
    }

    fn figment_to_config(extra_conf_file: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(Self::static_conf_file_path()));
        if let Some(conf_file) = extra_conf_file {
            figment = figment.merge(Toml::file(conf_file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX)).extract()
    }

    fn clap_merge(&mut self, cli: &Config) {
        macro_rules! merge {
            ($($field:ident),*) => {
                $(
                    if cli.$field.is_some() {
                        self.$field = cli.$field.clone();
                    }
                )*
            };
        }
        merge!(
            dataset,
            input,
            output,
            speedup_output,
            grid_steps,
            min_points_for_fit,
            epsilon,
            fit_scoring,
            include_measured_points,
            strata,
            stride_targets,
            thread_targets,
            saturation_margin,
            bandwidth_ceiling,
            error_mode,
            log_axis,
            centre,
            baseline_build,
            candidate_build,
            lscpu,
            aliases,
            log_level,
            conf_file
        );
    }

    /// Layer a run-time TOML file under the command-line flags.
    ///
    /// An empty path is a no-op. Values from the file only replace values
    /// that still hold their default and were not given on the command line.
    pub fn parse_extra_conf_file(
        &mut self,
        conf_file: &Path,
        cli: &Config,
    ) -> Result<(), std::io::Error> {
        if conf_file.as_os_str() == "" {
            return Ok(());
        }

        if conf_file.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::IsADirectory,
                format!("{} is not a file path", conf_file.display()),
            ));
        }

        if !conf_file.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", conf_file.display()),
            ));
        }

        let from_file = Self::figment_to_config(Some(conf_file))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let defaults = Config::default();

        macro_rules! merge_existing {
            ($($field:ident),*) => {
                $(
                    if cli.$field.is_some() {
                        self.$field = cli.$field.clone();
                    } else if from_file.$field != defaults.$field {
                        self.$field = from_file.$field.clone();
                    }
                )*
            };
        }
        merge_existing!(
            dataset,
            input,
            output,
            speedup_output,
            grid_steps,
            min_points_for_fit,
            epsilon,
            fit_scoring,
            include_measured_points,
            strata,
            stride_targets,
            thread_targets,
            saturation_margin,
            bandwidth_ceiling,
            error_mode,
            log_axis,
            centre,
            baseline_build,
            candidate_build,
            lscpu,
            aliases,
            log_level,
            conf_file
        );
        Ok(())
    }

    /// Validate the merged record.
    pub fn settings(&self) -> GridResult<RunSettings> {
        let defaults = Config::default();
        macro_rules! value {
            ($field:ident) => {
                self.$field
                    .clone()
                    .or(defaults.$field.clone())
                    .unwrap_or_default()
            };
        }

        let input = value!(input);
        if input.as_os_str().is_empty() {
            return grid_error!("no input file given (use --input)");
        }
        let output = value!(output);
        if output.as_os_str().is_empty() {
            return grid_error!("no output file given (use --output)");
        }

        let fit = FitConfig {
            grid_steps: value!(grid_steps),
            min_points_for_fit: value!(min_points_for_fit),
            epsilon: value!(epsilon),
            scoring: value!(fit_scoring).parse::<FitScoring>()?,
            include_measured_points: value!(include_measured_points),
        };
        fit.validate()?;

        let strata: Vec<String> = value!(strata)
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if strata.is_empty() {
            return grid_error!("at least one stratum is required");
        }
        let stride_targets = value!(stride_targets);
        if stride_targets.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return grid_error!(format!(
                "stride targets must be positive, got {stride_targets:?}"
            ));
        }
        let thread_targets = value!(thread_targets);
        if thread_targets.iter().any(|t| !(t.is_finite() && *t > 0.0)) {
            return grid_error!(format!(
                "thread targets must be positive, got {thread_targets:?}"
            ));
        }

        let ceiling = value!(bandwidth_ceiling);
        Ok(RunSettings {
            dataset: value!(dataset).parse()?,
            input,
            output,
            speedup_output: non_empty(value!(speedup_output)),
            fit,
            strata,
            stride_targets,
            thread_targets,
            saturation_margin: value!(saturation_margin),
            bandwidth_ceiling: (ceiling > 0.0).then_some(ceiling),
            error_mode: value!(error_mode).parse()?,
            log_axis: value!(log_axis),
            centre: value!(centre).parse()?,
            baseline_build: value!(baseline_build).trim().to_lowercase(),
            candidate_build: value!(candidate_build).trim().to_lowercase(),
            lscpu: non_empty(value!(lscpu)),
            aliases: non_empty(value!(aliases)),
        })
    }
}

fn non_empty(path: PathBuf) -> Option<PathBuf> {
    (!path.as_os_str().is_empty()).then_some(path)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dataset {
    Kernels,
    Stride,
    Threads,
}

impl FromStr for Dataset {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kernels" => Ok(Dataset::Kernels),
            "stride" => Ok(Dataset::Stride),
            "threads" => Ok(Dataset::Threads),
            _ => Err(GridError::Invalid(format!(
                "unknown dataset '{s}' (expected kernels, stride or threads)"
            ))),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Dataset::Kernels => write!(f, "kernels"),
            Dataset::Stride => write!(f, "stride"),
            Dataset::Threads => write!(f, "threads"),
        }
    }
}

/// Validated settings for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSettings {
    pub dataset: Dataset,
    pub input: PathBuf,
    pub output: PathBuf,
    pub speedup_output: Option<PathBuf>,
    pub fit: FitConfig,
    pub strata: Vec<String>,
    pub stride_targets: Vec<f64>,
    pub thread_targets: Vec<f64>,
    pub saturation_margin: f64,
    pub bandwidth_ceiling: Option<f64>,
    pub error_mode: ErrorMode,
    pub log_axis: bool,
    pub centre: Centre,
    pub baseline_build: String,
    pub candidate_build: String,
    pub lscpu: Option<PathBuf>,
    pub aliases: Option<PathBuf>,
}

impl RunSettings {
    /// Settings with every default for `dataset`, reading `input` and
    /// writing `output`.
    #[must_use]
    pub fn new(dataset: Dataset, input: &Path, output: &Path) -> Self {
        let fit = FitConfig::default();
        Self {
            dataset,
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            speedup_output: None,
            fit,
            strata: DEFAULT_STRATA.iter().map(|s| s.to_string()).collect(),
            stride_targets: DEFAULT_STRIDE_TARGETS.to_vec(),
            thread_targets: DEFAULT_THREAD_TARGETS.to_vec(),
            saturation_margin: DEFAULT_SATURATION_MARGIN,
            bandwidth_ceiling: None,
            error_mode: ErrorMode::default(),
            log_axis: false,
            centre: Centre::default(),
            baseline_build: "scalar".to_string(),
            candidate_build: "auto".to_string(),
            lscpu: None,
            aliases: None,
        }
    }
}
