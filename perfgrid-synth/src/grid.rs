// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Synthesized grid rows and their CSV layout.

use std::fmt;

use perfgrid_table::cell::Cell;
use perfgrid_table::table::Table;
use perfgrid_table::types::GridResult;

use crate::Provenance;

/// The model a stratum was completed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Estimator {
    Fit,
    Prior,
    Saturation,
}

impl fmt::Display for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Estimator::Fit => write!(f, "fit"),
            Estimator::Prior => write!(f, "prior"),
            Estimator::Saturation => write!(f, "saturation"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GridRow {
    /// `None` for grids with a single, unnamed stratum.
    pub stratum: Option<String>,
    pub axis: f64,
    pub bandwidth: f64,
    pub latency: f64,
    pub provenance: Provenance,
    pub estimator: Estimator,
}

/// Column names used when writing grid rows.
#[derive(Clone, Copy, Debug)]
pub struct GridLayout {
    pub axis: &'static str,
    pub stratum: Option<&'static str>,
    pub bandwidth: &'static str,
    pub latency: &'static str,
}

impl GridLayout {
    /// `stride_B, pattern, bandwidth_MBps, latency_ns, provenance, model`
    pub const STRIDE: GridLayout = GridLayout {
        axis: "stride_B",
        stratum: Some("pattern"),
        bandwidth: "bandwidth_MBps",
        latency: "latency_ns",
    };

    /// `threads, bandwidth_MBps, avg_latency_ns, provenance, model`
    pub const THREADS: GridLayout = GridLayout {
        axis: "threads",
        stratum: None,
        bandwidth: "bandwidth_MBps",
        latency: "avg_latency_ns",
    };

    fn columns(&self) -> Vec<String> {
        let mut columns = vec![self.axis.to_string()];
        columns.extend(self.stratum.map(str::to_string));
        columns.extend(
            [self.bandwidth, self.latency, "provenance", "model"]
                .iter()
                .map(|c| c.to_string()),
        );
        columns
    }
}

/// Lay grid rows out as a table, one row each, in the given order.
pub fn to_table(rows: &[GridRow], layout: &GridLayout) -> GridResult<Table> {
    let mut table = Table::new(layout.columns());
    for row in rows {
        let mut cells = vec![Cell::Number(row.axis)];
        if layout.stratum.is_some() {
            cells.push(row.stratum.clone().map_or(Cell::Missing, Cell::Label));
        }
        cells.push(Cell::Number(row.bandwidth));
        cells.push(Cell::Number(row.latency));
        cells.push(Cell::Label(row.provenance.to_string()));
        cells.push(Cell::Label(row.estimator.to_string()));
        table.push_row(cells)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_layout() {
        let rows = [GridRow {
            stratum: Some("seq".to_string()),
            axis: 64.0,
            bandwidth: 10000.0,
            latency: 100.5,
            provenance: Provenance::Measured,
            estimator: Estimator::Fit,
        }];
        let csv = to_table(&rows, &GridLayout::STRIDE)
            .unwrap()
            .to_csv_string()
            .unwrap();
        assert_eq!(
            csv,
            "stride_B,pattern,bandwidth_MBps,latency_ns,provenance,model\n\
             64,seq,10000,100.5,measured,fit\n"
        );
    }

    #[test]
    fn threads_layout_has_no_stratum() {
        let rows = [GridRow {
            stratum: None,
            axis: 4.0,
            bandwidth: 1.5,
            latency: 90.0,
            provenance: Provenance::Synthesized,
            estimator: Estimator::Prior,
        }];
        let table = to_table(&rows, &GridLayout::THREADS).unwrap();
        assert_eq!(
            table.columns(),
            ["threads", "bandwidth_MBps", "avg_latency_ns", "provenance", "model"]
        );
        assert_eq!(table.rows()[0][4], Cell::from("prior"));
    }
}
