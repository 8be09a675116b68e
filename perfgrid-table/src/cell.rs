// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::fmt;

/// A single value within a [`Table`](crate::table::Table).
///
/// Raw CSV input is read as `Label`s. Normalisation turns numeric columns
/// into `Number`s and anything that fails to parse into `Missing`.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Label(String),
    Number(f64),
    Missing,
}

impl Cell {
    /// Build a cell from a raw CSV field. Blank fields are `Missing`.
    #[must_use]
    pub fn from_raw(field: &str) -> Self {
        if field.trim().is_empty() {
            Cell::Missing
        } else {
            Cell::Label(field.to_string())
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_label(&self) -> Option<&str> {
        match self {
            Cell::Label(label) => Some(label),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Missing, Cell::Number)
    }
}

impl From<&str> for Cell {
    fn from(label: &str) -> Self {
        Cell::Label(label.to_string())
    }
}

impl From<String> for Cell {
    fn from(label: String) -> Self {
        Cell::Label(label)
    }
}

/// Numbers use the shortest representation that round-trips, so writing and
/// re-reading a table never changes a value.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::Label(label) => write!(f, "{label}"),
            Cell::Number(value) => write!(f, "{value}"),
            Cell::Missing => Ok(()),
        }
    }
}
