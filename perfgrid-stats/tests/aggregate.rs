// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use approx::assert_relative_eq;
use perfgrid_stats::aggregate::{Aggregator, Centre, MetricSpec};
use perfgrid_table::cell::Cell;
use perfgrid_table::normalize::Normalizer;
use perfgrid_table::table::Table;
use perfgrid_table::types::GridError;

fn load(csv: &str) -> Table {
    Normalizer::new()
        .categorical(&["kernel", "build"])
        .numeric(&["n", "median_ms", "stdev_ms"])
        .normalize(&Table::from_string(csv).unwrap())
}

fn time_aggregator() -> Aggregator {
    Aggregator::new(
        &["kernel", "n"],
        vec![MetricSpec::new("median_ms").with_dispersion("stdev_ms")],
    )
}

#[test]
fn median_ignores_outlier() {
    let table = load(
        "kernel,n,median_ms,stdev_ms
saxpy,1024,10,1
saxpy,1024,10,2
saxpy,1024,1000,3
saxpy,1024,10,4
",
    );
    let cells = time_aggregator().aggregate(&table).unwrap();
    assert_eq!(cells.len(), 1);

    let summary = &cells[0].metrics[0];
    assert_eq!(summary.central, 10.0);
    assert_eq!(summary.dispersion, Some(2.5));
    assert_eq!(summary.samples, 4);
    assert_eq!(cells[0].trials, 4);
    assert!(summary.spread.unwrap() > 400.0);
}

#[test]
fn mean_on_request() {
    let table = load("kernel,n,median_ms\ndot,1,10\ndot,1,10\ndot,1,10\ndot,1,1000\n");
    let cells = time_aggregator()
        .with_centre(Centre::Mean)
        .aggregate(&table)
        .unwrap();
    assert_relative_eq!(cells[0].metrics[0].central, 257.5);
}

#[test]
fn sorted_by_key_regardless_of_input_order() {
    let forward = load(
        "kernel,n,median_ms
saxpy,4096,4
dot,1024,1
saxpy,1024,2
dot,4096,3
",
    );
    let reversed = load(
        "kernel,n,median_ms
dot,4096,3
saxpy,1024,2
dot,1024,1
saxpy,4096,4
",
    );
    let a = time_aggregator().aggregate(&forward).unwrap();
    let b = time_aggregator().aggregate(&reversed).unwrap();
    assert_eq!(a, b);

    let keys: Vec<_> = a.iter().map(|c| c.key.clone()).collect();
    assert_eq!(
        keys,
        vec![
            vec![Cell::from("dot"), Cell::Number(1024.0)],
            vec![Cell::from("dot"), Cell::Number(4096.0)],
            vec![Cell::from("saxpy"), Cell::Number(1024.0)],
            vec![Cell::from("saxpy"), Cell::Number(4096.0)],
        ]
    );
}

#[test]
fn single_trial_has_no_spread() {
    let table = load("kernel,n,median_ms\newmul,8,0.5\n");
    let cells = time_aggregator().aggregate(&table).unwrap();
    let summary = &cells[0].metrics[0];
    assert_eq!(summary.spread, None);
    assert_eq!(summary.dispersion, None);
    assert_eq!(summary.ci95(), None);
    assert_eq!(summary.best_dispersion(), None);
}

#[test]
fn ci95_from_trials() {
    let table = load("kernel,n,median_ms\ndot,1,1\ndot,1,3\n");
    let cells = time_aggregator().aggregate(&table).unwrap();
    let summary = &cells[0].metrics[0];
    assert_relative_eq!(summary.ci95().unwrap(), 1.96);
    assert_eq!(summary.best_dispersion(), summary.spread);
}

#[test]
fn key_with_no_metric_values_is_dropped() {
    let table = load(
        "kernel,n,median_ms
dot,1,bad
dot,1,
saxpy,1,2
",
    );
    let cells = time_aggregator().aggregate(&table).unwrap();
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].key[0], Cell::from("saxpy"));
}

#[test]
fn rows_with_missing_key_are_excluded() {
    let table = load("kernel,n,median_ms\n,1,5\nsaxpy,,6\nsaxpy,1,7\n");
    let cells = time_aggregator().aggregate(&table).unwrap();
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].trials, 1);
    assert_eq!(cells[0].metrics[0].central, 7.0);
}

#[test]
fn empty_input_is_fatal() {
    let table = load("kernel,n,median_ms\n");
    assert!(matches!(
        time_aggregator().aggregate(&table),
        Err(GridError::EmptyInput(_))
    ));
}

#[test]
fn missing_key_column_is_fatal() {
    let table = load("kernel,median_ms\nsaxpy,1\n");
    match time_aggregator().aggregate(&table) {
        Err(GridError::MissingColumn { column, .. }) => assert_eq!(column, "n"),
        other => panic!("unexpected result {other:?}"),
    }
}
