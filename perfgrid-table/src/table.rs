// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! In-memory CSV table.
//!
//! The whole input is loaded at once; every stage of the pipeline takes a
//! `&Table` and returns a new one.

use std::fs::File;
use std::io;
use std::path::Path;

use log::debug;

use crate::cell::Cell;
use crate::grid_error;
use crate::types::{GridError, GridResult};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_file(path: &Path) -> GridResult<Self> {
        let file = File::open(path)
            .map_err(|e| GridError::Io(format!("Unable to read {}: {e}", path.display())))?;
        Self::from_reader(file)
    }

    pub fn from_string(csv_str: &str) -> GridResult<Self> {
        Self::from_reader(csv_str.as_bytes())
    }

    /// Read a CSV with a header row.
    ///
    /// Short records are padded with `Missing`; fields beyond the header are
    /// dropped.
    pub fn from_reader<R: io::Read>(reader: R) -> GridResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.is_empty() {
            return Err(GridError::EmptyInput("no header row".to_string()));
        }

        let mut table = Table::new(headers.iter().map(str::to_string).collect());
        let num_columns = table.columns.len();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            if record.len() > num_columns {
                debug!(
                    "line {}: ignoring {} trailing fields",
                    line + 2,
                    record.len() - num_columns
                );
            }
            let row = (0..num_columns)
                .map(|i| record.get(i).map_or(Cell::Missing, Cell::from_raw))
                .collect();
            table.rows.push(row);
        }
        Ok(table)
    }

    pub fn write_file(&self, path: &Path) -> GridResult {
        let file = File::create(path)
            .map_err(|e| GridError::Io(format!("Unable to write {}: {e}", path.display())))?;
        self.to_writer(file)
    }

    pub fn to_writer<W: io::Write>(&self, writer: W) -> GridResult {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row.iter().map(Cell::to_string))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> GridResult<String> {
        let mut buffer = Vec::new();
        self.to_writer(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| GridError::Csv(e.to_string()))
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> GridResult {
        if row.len() != self.columns.len() {
            return grid_error!(format!(
                "row has {} cells but the table has {} columns",
                row.len(),
                self.columns.len()
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column that the caller cannot proceed without.
    pub fn require_column(&self, name: &str) -> GridResult<usize> {
        self.column_index(name)
            .ok_or_else(|| GridError::MissingColumn {
                column: name.to_string(),
                available: self.columns.clone(),
            })
    }

    /// Build a new table from `(source column index, new name)` pairs.
    pub(crate) fn project(&self, picks: &[(usize, String)]) -> Table {
        let columns = picks.iter().map(|(_, name)| name.clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| picks.iter().map(|(i, _)| row[*i].clone()).collect())
            .collect();
        Table { columns, rows }
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Vec<Cell>] {
        &mut self.rows
    }
}
