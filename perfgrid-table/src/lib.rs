// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Tabular input layer for `perfgrid`.
//!
//! Benchmark CSVs are read into a [`Table`](table::Table) of
//! [`Cell`](cell::Cell)s, projected onto canonical column names with a
//! [`ColumnAliases`](aliases::ColumnAliases) table and cleaned up by a
//! [`Normalizer`](normalize::Normalizer) before any statistics are computed.

pub mod aliases;
pub mod cell;
pub mod normalize;
pub mod table;
pub mod types;
