// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The three dataset pipelines.
//!
//! Each pipeline takes a loaded, canonical table and returns the table to
//! write. [`run`] ties loading, processing and writing together.

use log::{debug, info};
use perfgrid_stats::aggregate::{AggregatedCell, Aggregator, MetricSpec};
use perfgrid_stats::cache_info::{CacheSizes, working_set_bytes};
use perfgrid_stats::derive::{DerivedMetricEngine, TimeUnit, Timing, Uncertainty};
use perfgrid_stats::work::{DataType, KernelModel};
use perfgrid_synth::grid::{GridLayout, to_table};
use perfgrid_synth::saturation::{SaturationSynthesizer, ThreadPoint};
use perfgrid_synth::stride::{StridePoint, StrideSynthesizer};
use perfgrid_table::cell::Cell;
use perfgrid_table::table::Table;
use perfgrid_table::types::GridResult;

use crate::config::{Dataset, RunSettings};
use crate::schema::{KERNEL_KEY, Schema};

const KERNEL_COLUMNS: [&str; 10] = [
    "trials",
    "median_ms",
    "stdev_ms",
    "ci95_ms",
    "gflops",
    "gflops_err_lo",
    "gflops_err_hi",
    "error_mode",
    "intensity",
    "cache_level",
];

const SPEEDUP_COLUMNS: [&str; 5] = [
    "baseline_ms",
    "candidate_ms",
    "speedup",
    "speedup_rel_err",
    "speedup_err",
];

/// Kernel timings collapsed to one row per configuration.
#[derive(Clone, Debug)]
pub struct KernelSummary {
    key: Vec<String>,
    cells: Vec<AggregatedCell>,
}

impl KernelSummary {
    /// Aggregate by every kernel key column present in `table`.
    pub fn aggregate(table: &Table, settings: &RunSettings) -> GridResult<Self> {
        let key: Vec<&str> = KERNEL_KEY
            .iter()
            .copied()
            .filter(|column| table.column_index(column).is_some())
            .collect();
        let aggregator = Aggregator::new(
            &key,
            vec![MetricSpec::new("median_ms").with_dispersion("stdev_ms")],
        )
        .with_centre(settings.centre);
        let cells = aggregator.aggregate(table)?;
        Ok(Self {
            key: aggregator.key().to_vec(),
            cells,
        })
    }

    #[must_use]
    pub fn key(&self) -> &[String] {
        &self.key
    }

    fn key_cell<'a>(&self, cell: &'a AggregatedCell, column: &str) -> Option<&'a Cell> {
        let index = self.key.iter().position(|k| k == column)?;
        cell.key.get(index)
    }

    /// Throughput, uncertainty, intensity and cache level per configuration.
    pub fn kernels_table(&self, settings: &RunSettings, caches: &CacheSizes) -> GridResult<Table> {
        let engine = DerivedMetricEngine::new()
            .with_epsilon(settings.fit.epsilon)
            .with_log_axis(settings.log_axis);

        let mut columns = self.key.clone();
        columns.extend(KERNEL_COLUMNS.iter().map(|c| c.to_string()));
        let mut table = Table::new(columns);

        for cell in &self.cells {
            let kernel = self
                .key_cell(cell, "kernel")
                .and_then(Cell::as_label)
                .unwrap_or_default();
            let dtype = DataType::from_name(
                self.key_cell(cell, "dtype")
                    .and_then(Cell::as_label)
                    .unwrap_or_default(),
            );
            let n = self
                .key_cell(cell, "n")
                .and_then(Cell::as_number)
                .unwrap_or_default();
            let model = KernelModel::for_kernel(kernel);

            let summary = &cell.metrics[0];
            let stdev_ms = summary.best_dispersion();
            let timing = Timing::in_unit(summary.central, stdev_ms, TimeUnit::Milliseconds);
            let derived = engine.derive(model.work_gflop(n), timing, settings.error_mode);
            let error_mode = match derived.uncertainty {
                Uncertainty::None => Cell::Missing,
                _ => Cell::Label(derived.mode.to_string()),
            };
            // Saturates at u64::MAX for huge or infinite N
            let level = caches.level_for(working_set_bytes(n.max(0.0) as u64, dtype));

            let mut row = cell.key.clone();
            row.extend([
                Cell::Number(cell.trials as f64),
                Cell::Number(summary.central),
                Cell::from(stdev_ms),
                Cell::from(summary.ci95()),
                Cell::Number(derived.value),
                Cell::from(derived.uncertainty.lower()),
                Cell::from(derived.uncertainty.upper()),
                error_mode,
                Cell::Number(model.intensity(dtype)),
                Cell::Label(level.to_string()),
            ]);
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// `baseline / candidate` time for every configuration measured with
    /// both builds. Configurations missing either build are left out.
    pub fn speedup_table(&self, settings: &RunSettings) -> GridResult<Table> {
        let engine = DerivedMetricEngine::new().with_epsilon(settings.fit.epsilon);

        let mut columns: Vec<String> = self
            .key
            .iter()
            .filter(|k| *k != "build")
            .cloned()
            .collect();
        columns.extend(SPEEDUP_COLUMNS.iter().map(|c| c.to_string()));
        let mut table = Table::new(columns);

        let Some(build_index) = self.key.iter().position(|k| k == "build") else {
            info!("no build column, skipping speedups");
            return Ok(table);
        };
        let configuration = |cell: &AggregatedCell| -> Vec<Cell> {
            let mut key = cell.key.clone();
            key.remove(build_index);
            key
        };
        let timing_for = |group: &[AggregatedCell], build: &str| -> Option<Timing> {
            group
                .iter()
                .find(|c| c.key[build_index].as_label() == Some(build))
                .map(|c| {
                    let summary = &c.metrics[0];
                    Timing::new(summary.central, summary.best_dispersion())
                })
        };

        // build is the last key column, so the cells of one configuration
        // are adjacent in key order
        for group in self
            .cells
            .chunk_by(|a, b| configuration(a) == configuration(b))
        {
            let baseline = timing_for(group, &settings.baseline_build);
            let candidate = timing_for(group, &settings.candidate_build);
            let (Some(baseline), Some(candidate)) = (baseline, candidate) else {
                debug!(
                    "no {} / {} pair for {:?}",
                    settings.baseline_build,
                    settings.candidate_build,
                    configuration(&group[0])
                );
                continue;
            };
            let ratio = engine.ratio(baseline, candidate);

            let mut row = configuration(&group[0]);
            row.extend([
                Cell::Number(baseline.time),
                Cell::Number(candidate.time),
                Cell::Number(ratio.value),
                Cell::Number(ratio.relative_error),
                Cell::Number(ratio.error),
            ]);
            table.push_row(row)?;
        }
        Ok(table)
    }
}

/// Median bandwidth and latency per (pattern, stride), completed onto the
/// configured strides.
pub fn stride_table(table: &Table, settings: &RunSettings) -> GridResult<Table> {
    let cells = Aggregator::new(
        &["pattern", "stride_B"],
        vec![
            MetricSpec::new("bandwidth_MBps"),
            MetricSpec::new("latency_ns"),
        ],
    )
    .with_centre(settings.centre)
    .aggregate(table)?;

    let points: Vec<StridePoint> = cells
        .iter()
        .filter_map(|cell| {
            Some(StridePoint {
                stratum: cell.key[0].as_label()?.to_string(),
                stride: cell.key[1].as_number()?,
                bandwidth: cell.metrics[0].central,
                latency: cell.metrics[1].central,
            })
        })
        .collect();

    let strata: Vec<&str> = settings.strata.iter().map(String::as_str).collect();
    let rows = StrideSynthesizer::new(settings.fit.clone())
        .with_strata(&strata)
        .with_targets(&settings.stride_targets)
        .synthesize(&points);
    to_table(&rows, &GridLayout::STRIDE)
}

/// Median bandwidth and latency per thread count, completed onto the
/// configured thread counts.
pub fn threads_table(table: &Table, settings: &RunSettings) -> GridResult<Table> {
    let cells = Aggregator::new(
        &["threads"],
        vec![
            MetricSpec::new("bandwidth_MBps"),
            MetricSpec::new("avg_latency_ns"),
        ],
    )
    .with_centre(settings.centre)
    .aggregate(table)?;

    let points: Vec<ThreadPoint> = cells
        .iter()
        .filter_map(|cell| {
            Some(ThreadPoint {
                threads: cell.key[0].as_number()?,
                bandwidth: cell.metrics[0].central,
                latency: cell.metrics[1].central,
            })
        })
        .collect();

    let rows = SaturationSynthesizer::new(settings.fit.clone())
        .with_targets(&settings.thread_targets)
        .with_margin(settings.saturation_margin)
        .with_ceiling(settings.bandwidth_ceiling)
        .synthesize(&points);
    to_table(&rows, &GridLayout::THREADS)
}

/// Load the input, run the dataset's pipeline and write the output(s).
pub fn run(settings: &RunSettings) -> GridResult {
    let mut schema = Schema::for_dataset(settings.dataset);
    if let Some(aliases) = &settings.aliases {
        schema = schema.with_alias_file(aliases)?;
    }
    let table = schema.load(&settings.input)?;

    let output = match settings.dataset {
        Dataset::Kernels => {
            let caches = match &settings.lscpu {
                Some(path) => CacheSizes::from_lscpu_file(path),
                None => {
                    info!("no lscpu dump given, using default cache sizes");
                    CacheSizes::default()
                }
            };
            let summary = KernelSummary::aggregate(&table, settings)?;
            if let Some(path) = &settings.speedup_output {
                let speedups = summary.speedup_table(settings)?;
                speedups.write_file(path)?;
                info!("wrote {} speedup rows to {}", speedups.len(), path.display());
            }
            summary.kernels_table(settings, &caches)?
        }
        Dataset::Stride => stride_table(&table, settings)?,
        Dataset::Threads => threads_table(&table, settings)?,
    };

    output.write_file(&settings.output)?;
    info!(
        "wrote {} {} rows to {}",
        output.len(),
        settings.dataset,
        settings.output.display()
    );
    Ok(())
}
