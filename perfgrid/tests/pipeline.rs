// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use perfgrid::config::{Dataset, RunSettings};
use perfgrid::pipeline::run;
use perfgrid_table::table::Table;
use perfgrid_table::types::GridError;
use tempfile::TempDir;

struct Run {
    dir: TempDir,
    settings: RunSettings,
}

impl Run {
    fn new(dataset: Dataset, input: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("input.csv");
        fs::write(&input_path, input).unwrap();
        let settings = RunSettings::new(dataset, &input_path, &dir.path().join("output.csv"));
        Self { dir, settings }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn output(&self) -> Table {
        Table::from_file(&self.settings.output).unwrap()
    }
}

/// Output tables are read back as text.
fn text<'a>(table: &'a Table, row: usize, column: &str) -> &'a str {
    let index = table.column_index(column).unwrap();
    table.rows()[row][index].as_label().unwrap_or_default()
}

fn number(table: &Table, row: usize, column: &str) -> f64 {
    text(table, row, column).parse().unwrap()
}

fn rows_where<'a>(table: &'a Table, column: &str, value: &str) -> Vec<usize> {
    (0..table.len())
        .filter(|row| text(table, *row, column) == value)
        .collect()
}

const KERNELS: &str = "\
kernel,dtype,align,stride,N,build,median_ms,stdev_ms
saxpy,f32,aligned,1,1000000,scalar,2.0,0.02
SAXPY,f32,aligned,1,1000000,scalar,2.2,0.02
saxpy,f32,aligned,1,1000000,scalar,1.8,0.02
saxpy,f32,aligned,1,1000000,auto,1.0,0.03
dot,f64,aligned,1,1000,scalar,0.5,
dot,f64,aligned,1,1000,scalar,0.5,
";

#[test]
fn kernels_throughput_and_uncertainty() {
    let mut job = Run::new(Dataset::Kernels, KERNELS);
    job.settings.speedup_output = Some(job.path("speedup.csv"));
    run(&job.settings).unwrap();

    let table = job.output();
    assert_eq!(
        table.columns(),
        [
            "kernel",
            "dtype",
            "align",
            "stride",
            "n",
            "build",
            "trials",
            "median_ms",
            "stdev_ms",
            "ci95_ms",
            "gflops",
            "gflops_err_lo",
            "gflops_err_hi",
            "error_mode",
            "intensity",
            "cache_level"
        ]
    );
    assert_eq!(table.len(), 3);

    // Sorted by key: dot before saxpy, auto before scalar
    assert_eq!(text(&table, 0, "kernel"), "dot");
    assert_eq!(text(&table, 1, "build"), "auto");
    assert_eq!(text(&table, 2, "build"), "scalar");

    // saxpy scalar: 2e-3 GFLOP in 2 ms, 1% dispersion
    assert_eq!(number(&table, 2, "trials"), 3.0);
    assert_eq!(number(&table, 2, "median_ms"), 2.0);
    assert_eq!(number(&table, 2, "stdev_ms"), 0.02);
    assert_relative_eq!(
        number(&table, 2, "ci95_ms"),
        1.96 * 0.2 / 3.0_f64.sqrt(),
        max_relative = 1e-9
    );
    assert_eq!(text(&table, 1, "ci95_ms"), "");
    assert_relative_eq!(number(&table, 2, "gflops"), 1.0, max_relative = 1e-12);
    assert_relative_eq!(number(&table, 2, "gflops_err_lo"), 0.01, max_relative = 1e-9);
    assert_relative_eq!(number(&table, 2, "gflops_err_hi"), 0.01, max_relative = 1e-9);
    assert_eq!(text(&table, 2, "error_mode"), "relative");
    assert_relative_eq!(number(&table, 2, "intensity"), 2.0 / 12.0, max_relative = 1e-12);
    assert_eq!(text(&table, 2, "cache_level"), "LLC");

    // dot: no upstream dispersion, identical trials
    assert_relative_eq!(number(&table, 0, "gflops"), 0.004, max_relative = 1e-12);
    assert_eq!(number(&table, 0, "stdev_ms"), 0.0);
    assert_eq!(number(&table, 0, "ci95_ms"), 0.0);
    assert_eq!(text(&table, 0, "cache_level"), "L1");

    let speedup = Table::from_file(&job.path("speedup.csv")).unwrap();
    assert_eq!(
        speedup.columns(),
        [
            "kernel",
            "dtype",
            "align",
            "stride",
            "n",
            "baseline_ms",
            "candidate_ms",
            "speedup",
            "speedup_rel_err",
            "speedup_err"
        ]
    );
    assert_eq!(speedup.len(), 1);
    assert_eq!(text(&speedup, 0, "kernel"), "saxpy");
    assert_eq!(number(&speedup, 0, "speedup"), 2.0);
    let rel = (0.01_f64.powi(2) + 0.03_f64.powi(2)).sqrt();
    assert_relative_eq!(number(&speedup, 0, "speedup_rel_err"), rel, max_relative = 1e-9);
    assert_relative_eq!(number(&speedup, 0, "speedup_err"), 2.0 * rel, max_relative = 1e-9);
}

#[test]
fn kernels_large_dispersion_is_asymmetric() {
    let job = Run::new(
        Dataset::Kernels,
        "kernel,dtype,n,build,time_ms,stdev_ms\nsaxpy,f32,1000000,scalar,2.0,0.2\n",
    );
    run(&job.settings).unwrap();

    let table = job.output();
    assert_eq!(table.columns()[..4], ["kernel", "dtype", "n", "build"]);
    assert_eq!(text(&table, 0, "error_mode"), "asymmetric");
    let lower = number(&table, 0, "gflops_err_lo");
    let upper = number(&table, 0, "gflops_err_hi");
    assert_relative_eq!(lower, 1.0 - 2.0 / 2.2, max_relative = 1e-9);
    assert_relative_eq!(upper, 2.0 / 1.8 - 1.0, max_relative = 1e-9);
}

#[test]
fn kernels_single_trial_has_no_uncertainty() {
    let job = Run::new(
        Dataset::Kernels,
        "kernel,dtype,n,build,median_ms\nmystery,f32,1000,scalar,0\n",
    );
    run(&job.settings).unwrap();

    let table = job.output();
    assert_eq!(text(&table, 0, "stdev_ms"), "");
    assert_eq!(text(&table, 0, "gflops_err_lo"), "");
    assert_eq!(text(&table, 0, "error_mode"), "");
    // Zero time is floored at epsilon
    assert_relative_eq!(number(&table, 0, "gflops"), 1e6, max_relative = 1e-12);
}

#[test]
fn kernels_huge_working_set_is_dram() {
    let job = Run::new(
        Dataset::Kernels,
        "kernel,dtype,n,build,median_ms\nsaxpy,f64,1e19,auto,1.0\nsaxpy,f64,inf,auto,1.0\n",
    );
    run(&job.settings).unwrap();

    let table = job.output();
    // Non-finite N is read as missing, so only one row has a key
    assert_eq!(table.len(), 1);
    assert_eq!(text(&table, 0, "cache_level"), "DRAM");
}

const STRIDE: &str = "\
access_bytes,mix,bandwidth,latency
64,Sequential,39.0625,100
64,Sequential,39.0625,100
256,Sequential,15.625,120
1024,Sequential,4.595588235294118,140
128,Random,900,200
";

#[test]
fn stride_grid() {
    let job = Run::new(Dataset::Stride, STRIDE);
    run(&job.settings).unwrap();

    let table = job.output();
    assert_eq!(
        table.columns(),
        ["stride_B", "pattern", "bandwidth_MBps", "latency_ns", "provenance", "model"]
    );
    assert_eq!(table.len(), 14);

    let seq = rows_where(&table, "pattern", "seq");
    assert_eq!(seq.len(), 7);
    for row in &seq {
        assert_eq!(text(&table, *row, "model"), "fit");
    }
    let measured = rows_where(&table, "provenance", "measured");
    assert_eq!(measured.len(), 3);
    assert_eq!(number(&table, measured[0], "stride_B"), 64.0);
    assert_eq!(number(&table, measured[0], "bandwidth_MBps"), 39.0625);
    assert_eq!(number(&table, measured[2], "bandwidth_MBps"), 4.595588235294118);
    assert_eq!(number(&table, measured[2], "latency_ns"), 140.0);

    // One random point is not enough to fit
    let rand = rows_where(&table, "pattern", "rand");
    assert_eq!(rand.len(), 7);
    for row in &rand {
        assert_eq!(text(&table, *row, "model"), "prior");
        assert_eq!(text(&table, *row, "provenance"), "synthesized");
    }
    assert_relative_eq!(
        number(&table, rand[0], "bandwidth_MBps"),
        15000.0 / 1.5 - 3000.0
    );
}

#[test]
fn stride_output_is_deterministic() {
    let job = Run::new(Dataset::Stride, STRIDE);
    run(&job.settings).unwrap();
    let first = fs::read(&job.settings.output).unwrap();
    run(&job.settings).unwrap();
    let second = fs::read(&job.settings.output).unwrap();
    assert_eq!(first, second);
}

#[test]
fn threads_grid() {
    let job = Run::new(
        Dataset::Threads,
        "threads,bandwidth_MBps,avg_latency_ns\n\
         1,9000,95\n\
         2,17000,90\n\
         4,29000,86\n\
         8,40000,84\n\
         8,40000,84\n",
    );
    run(&job.settings).unwrap();

    let table = job.output();
    assert_eq!(table.len(), 6);
    for (row, threads) in [1.0, 2.0, 4.0, 8.0].iter().enumerate() {
        assert_eq!(number(&table, row, "threads"), *threads);
        assert_eq!(text(&table, row, "provenance"), "measured");
    }
    assert_eq!(number(&table, 3, "bandwidth_MBps"), 40000.0);

    let bw_16 = number(&table, 4, "bandwidth_MBps");
    let bw_32 = number(&table, 5, "bandwidth_MBps");
    assert_eq!(text(&table, 4, "model"), "saturation");
    assert!(bw_16 > 40000.0 && bw_16 < bw_32 && bw_32 < 42000.0);
}

#[test]
fn aliases_from_file() {
    let mut job = Run::new(Dataset::Threads, "cores,bw,lat\n1,1000,90\n");
    let aliases = job.path("aliases.yaml");
    fs::write(
        &aliases,
        "- canonical: threads\n  required: true\n  aliases: [cores]\n\
         - canonical: bandwidth_MBps\n  required: true\n  aliases: [bw]\n\
         - canonical: avg_latency_ns\n  required: true\n  aliases: [lat]\n",
    )
    .unwrap();

    assert!(matches!(
        run(&job.settings),
        Err(GridError::MissingColumn { .. })
    ));

    job.settings.aliases = Some(aliases);
    run(&job.settings).unwrap();
    assert_eq!(job.output().len(), 6);
}

#[test]
fn empty_input_is_an_error() {
    let job = Run::new(Dataset::Stride, "stride_B,pattern,bandwidth_MBps,latency_ns\n");
    assert!(matches!(
        run(&job.settings),
        Err(GridError::EmptyInput(_))
    ));
    assert!(!job.settings.output.exists());
}

#[test]
fn unreadable_input_is_an_error() {
    let mut job = Run::new(Dataset::Threads, "");
    job.settings.input = job.path("missing.csv");
    assert!(run(&job.settings).is_err());
}
