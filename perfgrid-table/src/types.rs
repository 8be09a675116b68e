// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Shared types.

use std::error::Error;
use std::fmt;

use itertools::Itertools;

#[macro_export]
/// Return a [GridError::Invalid] built from a message that supports
/// `to_string`
macro_rules! grid_error {
    ($msg:expr) => {
        Err($crate::types::GridError::Invalid($msg.to_string()))?
    };
}

/// The `GridError` is what should be returned when a table cannot be
/// processed.
///
/// Only structural problems are errors. Bad numeric cells and sparse data are
/// handled where they occur and never reach this type.
#[derive(Debug)]
pub enum GridError {
    /// A required column is absent from the input.
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// The input contained no data rows (or no header).
    EmptyInput(String),

    /// Reading or writing a file failed.
    Io(String),

    /// The CSV layer rejected the input.
    Csv(String),

    /// Any other contract violation by the caller.
    Invalid(String),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GridError::MissingColumn { column, available } => {
                write!(
                    f,
                    "Error: missing required column '{column}' (available: {})",
                    available.iter().join(", ")
                )
            }
            GridError::EmptyInput(context) => {
                write!(f, "Error: empty input: {context}")
            }
            GridError::Io(msg) => {
                write!(f, "Error: I/O: {msg}")
            }
            GridError::Csv(msg) => {
                write!(f, "Error: CSV: {msg}")
            }
            GridError::Invalid(msg) => {
                write!(f, "Error: {msg}")
            }
        }
    }
}

impl Error for GridError {}

impl From<std::io::Error> for GridError {
    fn from(e: std::io::Error) -> Self {
        GridError::Io(e.to_string())
    }
}

impl From<csv::Error> for GridError {
    fn from(e: csv::Error) -> Self {
        GridError::Csv(e.to_string())
    }
}

/// The GridResult is the return type for most table operations
pub type GridResult<T = ()> = Result<T, GridError>;
