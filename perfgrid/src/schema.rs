// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Input schemas for each dataset.
//!
//! A schema pairs the column-alias table with the normaliser for the
//! canonical columns. Loading an input file resolves the aliases and then
//! normalises, so the pipelines only ever see canonical, typed columns.

use std::path::Path;

use log::info;
use perfgrid_table::aliases::ColumnAliases;
use perfgrid_table::normalize::Normalizer;
use perfgrid_table::table::Table;
use perfgrid_table::types::GridResult;

use crate::config::Dataset;

/// Kernel key columns in output order. `align` and `stride` are optional.
pub const KERNEL_KEY: [&str; 6] = ["kernel", "dtype", "align", "stride", "n", "build"];

#[derive(Clone, Debug)]
pub struct Schema {
    aliases: ColumnAliases,
    normalizer: Normalizer,
}

impl Schema {
    #[must_use]
    pub fn for_dataset(dataset: Dataset) -> Self {
        match dataset {
            Dataset::Kernels => Self::kernels(),
            Dataset::Stride => Self::stride(),
            Dataset::Threads => Self::threads(),
        }
    }

    fn kernels() -> Self {
        Self {
            aliases: ColumnAliases::new()
                .required("kernel", &["name"])
                .required("dtype", &["type"])
                .optional("align", &["alignment"])
                .optional("stride", &[])
                .required("n", &["size", "elements"])
                .required("build", &["variant"])
                .required("median_ms", &["time_ms", "ms"])
                .optional("stdev_ms", &["std_ms", "stddev_ms"]),
            normalizer: Normalizer::new()
                .categorical(&["kernel", "dtype", "align", "build"])
                .numeric(&["stride", "n", "median_ms", "stdev_ms"]),
        }
    }

    fn stride() -> Self {
        Self {
            aliases: ColumnAliases::new()
                .required("stride_B", &["stride_b", "stride", "access_bytes", "bs"])
                .required("pattern", &["mix", "type"])
                .required(
                    "bandwidth_MBps",
                    &["bandwidth_mbps", "bandwidth", "bandwidth_mb/s"],
                )
                .required("latency_ns", &["avg_latency_ns", "latency"]),
            normalizer: Normalizer::new()
                .categorical(&["pattern"])
                .numeric(&["stride_B", "bandwidth_MBps", "latency_ns"])
                .canonical_label("pattern", "seq", "seq")
                .canonical_label("pattern", "rand", "rand"),
        }
    }

    fn threads() -> Self {
        Self {
            aliases: ColumnAliases::new()
                .required("threads", &["t", "nthreads"])
                .required("bandwidth_MBps", &["bandwidth_mbps", "bandwidth"])
                .required("avg_latency_ns", &["latency_ns", "latency"]),
            normalizer: Normalizer::new().numeric(&["threads", "bandwidth_MBps", "avg_latency_ns"]),
        }
    }

    /// Replace the built-in alias table with one loaded from YAML.
    pub fn with_alias_file(mut self, path: &Path) -> GridResult<Self> {
        info!("reading column aliases from {}", path.display());
        self.aliases = ColumnAliases::from_file(path)?;
        Ok(self)
    }

    /// Resolve aliases and normalise an already-read table.
    pub fn prepare(&self, raw: &Table) -> GridResult<Table> {
        let canonical = self.aliases.apply(raw)?;
        Ok(self.normalizer.normalize(&canonical))
    }

    /// Read, resolve and normalise an input file.
    pub fn load(&self, path: &Path) -> GridResult<Table> {
        let raw = Table::from_file(path)?;
        info!("read {} rows from {}", raw.len(), path.display());
        self.prepare(&raw)
    }
}
