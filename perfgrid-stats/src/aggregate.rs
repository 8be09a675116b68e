// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Grouped aggregation of repeated trials.
//!
//! Rows sharing an identical key are collapsed into one [`AggregatedCell`].
//! For each requested metric the central value is the median of the trial
//! values (or the mean when asked for) and the dispersion is the median of
//! the matching per-row dispersion column, if there is one.
//!
//! Output is sorted by key so the result never depends on input row order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use log::debug;
use perfgrid_table::cell::Cell;
use perfgrid_table::table::Table;
use perfgrid_table::types::{GridError, GridResult};

/// z-score used for the 95% confidence half-width.
const Z_95: f64 = 1.96;

/// Central tendency used to collapse trials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Centre {
    #[default]
    Median,
    Mean,
}

impl FromStr for Centre {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "median" => Ok(Centre::Median),
            "mean" => Ok(Centre::Mean),
            _ => Err(GridError::Invalid(format!(
                "unknown centre '{s}' (expected median or mean)"
            ))),
        }
    }
}

/// A metric column, optionally paired with an upstream dispersion column.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricSpec {
    pub column: String,
    pub dispersion: Option<String>,
}

impl MetricSpec {
    #[must_use]
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
            dispersion: None,
        }
    }

    #[must_use]
    pub fn with_dispersion(mut self, column: &str) -> Self {
        self.dispersion = Some(column.to_string());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricSummary {
    /// Median (or mean) of the trial values.
    pub central: f64,

    /// Median of the upstream dispersion column.
    pub dispersion: Option<f64>,

    /// Sample standard deviation of the trial values. Never inferred from a
    /// single trial.
    pub spread: Option<f64>,

    /// Number of trials that contributed a value.
    pub samples: usize,
}

impl MetricSummary {
    /// Half-width of the 95% confidence interval of the mean.
    #[must_use]
    pub fn ci95(&self) -> Option<f64> {
        self.spread.map(|sd| Z_95 * sd / (self.samples as f64).sqrt())
    }

    /// The upstream dispersion when present, otherwise the trial spread.
    #[must_use]
    pub fn best_dispersion(&self) -> Option<f64> {
        self.dispersion.or(self.spread)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedCell {
    /// Key values in the order the key columns were given.
    pub key: Vec<Cell>,

    /// One summary per requested metric, in request order.
    pub metrics: Vec<MetricSummary>,

    /// Number of input rows sharing the key.
    pub trials: usize,
}

/// Key wrapper giving cells a total order: numbers by IEEE total order,
/// labels lexicographically, numbers before labels.
#[derive(Clone, Debug, PartialEq)]
struct GroupKey(Vec<Cell>);

fn cmp_cell(a: &Cell, b: &Cell) -> Ordering {
    match (a, b) {
        (Cell::Number(x), Cell::Number(y)) => x.total_cmp(y),
        (Cell::Label(x), Cell::Label(y)) => x.cmp(y),
        (Cell::Number(_), _) => Ordering::Less,
        (_, Cell::Number(_)) => Ordering::Greater,
        (Cell::Label(_), Cell::Missing) => Ordering::Less,
        (Cell::Missing, Cell::Label(_)) => Ordering::Greater,
        (Cell::Missing, Cell::Missing) => Ordering::Equal,
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| cmp_cell(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| self.0.len().cmp(&other.0.len()))
    }
}

struct Samples {
    trials: usize,
    values: Vec<Vec<f64>>,
    dispersions: Vec<Vec<f64>>,
}

#[derive(Clone, Debug)]
pub struct Aggregator {
    key: Vec<String>,
    metrics: Vec<MetricSpec>,
    centre: Centre,
}

impl Aggregator {
    #[must_use]
    pub fn new(key: &[&str], metrics: Vec<MetricSpec>) -> Self {
        Self {
            key: key.iter().map(|k| k.to_string()).collect(),
            metrics,
            centre: Centre::default(),
        }
    }

    #[must_use]
    pub fn with_centre(mut self, centre: Centre) -> Self {
        self.centre = centre;
        self
    }

    #[must_use]
    pub fn key(&self) -> &[String] {
        &self.key
    }

    pub fn aggregate(&self, table: &Table) -> GridResult<Vec<AggregatedCell>> {
        if table.is_empty() {
            return Err(GridError::EmptyInput("no rows to aggregate".to_string()));
        }

        let key_indices = self
            .key
            .iter()
            .map(|k| table.require_column(k))
            .collect::<GridResult<Vec<_>>>()?;
        let metric_indices = self
            .metrics
            .iter()
            .map(|m| {
                let value = table.require_column(&m.column)?;
                let dispersion = m
                    .dispersion
                    .as_ref()
                    .and_then(|d| table.column_index(d));
                Ok((value, dispersion))
            })
            .collect::<GridResult<Vec<_>>>()?;

        let mut groups: BTreeMap<GroupKey, Samples> = BTreeMap::new();
        let mut skipped = 0;
        for row in table.rows() {
            let key: Vec<Cell> = key_indices.iter().map(|i| row[*i].clone()).collect();
            if key.iter().any(Cell::is_missing) {
                skipped += 1;
                continue;
            }

            let samples = groups.entry(GroupKey(key)).or_insert_with(|| Samples {
                trials: 0,
                values: vec![Vec::new(); metric_indices.len()],
                dispersions: vec![Vec::new(); metric_indices.len()],
            });
            samples.trials += 1;
            for (m, (value, dispersion)) in metric_indices.iter().enumerate() {
                if let Some(v) = row[*value].as_number() {
                    samples.values[m].push(v);
                }
                if let Some(d) = dispersion
                    .and_then(|d| row[d].as_number())
                    .filter(|d| *d >= 0.0)
                {
                    samples.dispersions[m].push(d);
                }
            }
        }
        if skipped > 0 {
            debug!("{skipped} rows with a missing key value excluded from grouping");
        }

        let mut cells = Vec::with_capacity(groups.len());
        for (key, samples) in groups {
            if let Some(m) = samples.values.iter().position(Vec::is_empty) {
                debug!(
                    "key {:?} dropped: no values for '{}'",
                    key.0, self.metrics[m].column
                );
                continue;
            }

            let metrics = samples
                .values
                .iter()
                .zip(&samples.dispersions)
                .map(|(values, dispersions)| self.summarise(values, dispersions))
                .collect();
            cells.push(AggregatedCell {
                key: key.0,
                metrics,
                trials: samples.trials,
            });
        }
        Ok(cells)
    }

    fn summarise(&self, values: &[f64], dispersions: &[f64]) -> MetricSummary {
        let central = match self.centre {
            Centre::Median => median(values),
            Centre::Mean => mean(values),
        };
        MetricSummary {
            central,
            dispersion: (!dispersions.is_empty()).then(|| median(dispersions)),
            spread: sample_std_dev(values),
            samples: values.len(),
        }
    }
}

/// Median of a non-empty slice. Even-length inputs average the two middle
/// values.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (n - 1) standard deviation, `None` for fewer than two values.
#[must_use]
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[10.0, 10.0, 10.0, 1000.0]), 10.0);
        assert_eq!(median(&[4.0, 1.0]), 2.5);
    }

    #[test]
    fn spread_needs_two_values() {
        assert_eq!(sample_std_dev(&[5.0]), None);
        assert_eq!(sample_std_dev(&[1.0, 3.0]), Some(2.0_f64.sqrt()));
    }

    #[test]
    fn numbers_sort_before_labels() {
        let mut keys = [
            GroupKey(vec![Cell::from("b")]),
            GroupKey(vec![Cell::Number(10.0)]),
            GroupKey(vec![Cell::from("a")]),
            GroupKey(vec![Cell::Number(2.0)]),
        ];
        keys.sort();
        assert_eq!(
            keys.map(|k| k.0[0].clone()),
            [
                Cell::Number(2.0),
                Cell::Number(10.0),
                Cell::from("a"),
                Cell::from("b")
            ]
        );
    }
}
