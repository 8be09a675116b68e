// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Column-alias resolution.
//!
//! Benchmark producers disagree on column names (`stride`, `stride_B`,
//! `access_bytes`, ...). An alias table maps each canonical column name to
//! the spellings accepted for it and is resolved once, when the input is
//! read. Everything downstream only ever sees canonical names.
//!
//! Tables can be built in code:
//! ```rust
//! use perfgrid_table::aliases::ColumnAliases;
//! use perfgrid_table::table::Table;
//!
//! let aliases = ColumnAliases::new()
//!     .required("stride_B", &["stride", "access_bytes"])
//!     .optional("latency_ns", &["latency"]);
//! let raw = Table::from_string("Stride,Latency\n64,100\n").unwrap();
//! let table = aliases.apply(&raw).unwrap();
//! assert_eq!(table.columns(), ["stride_B", "latency_ns"]);
//! ```
//!
//! or loaded from YAML:
//! ```yaml
//! - canonical: stride_B
//!   required: true
//!   aliases: [stride, access_bytes]
//! - canonical: latency_ns
//!   aliases: [latency]
//! ```

use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::table::Table;
use crate::types::{GridError, GridResult};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AliasEntry {
    pub canonical: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl AliasEntry {
    /// Candidate header spellings in priority order: the canonical name
    /// itself, then each alias.
    fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ColumnAliases {
    entries: Vec<AliasEntry>,
}

impl ColumnAliases {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(aliases_path: &Path) -> GridResult<Self> {
        let s = std::fs::read_to_string(aliases_path)
            .map_err(|e| GridError::Io(format!("Unable to read {}: {e}", aliases_path.display())))?;
        Self::from_string(&s)
    }

    pub fn from_string(aliases_str: &str) -> GridResult<Self> {
        serde_yaml::from_str(aliases_str)
            .map_err(|e| GridError::Invalid(format!("serde_yaml::from_str failed: {e}")))
    }

    #[must_use]
    pub fn required(self, canonical: &str, aliases: &[&str]) -> Self {
        self.with_entry(canonical, aliases, true)
    }

    #[must_use]
    pub fn optional(self, canonical: &str, aliases: &[&str]) -> Self {
        self.with_entry(canonical, aliases, false)
    }

    fn with_entry(mut self, canonical: &str, aliases: &[&str], required: bool) -> Self {
        self.entries.push(AliasEntry {
            canonical: canonical.to_string(),
            required,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        });
        self
    }

    #[must_use]
    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    /// Find the header used for each canonical column.
    ///
    /// Returns `(header index, canonical name)` pairs in declaration order.
    /// Optional columns that are not present are left out.
    pub fn resolve(&self, headers: &[String]) -> GridResult<Vec<(usize, String)>> {
        let folded: Vec<String> = headers.iter().map(|h| fold(h)).collect();

        let mut resolved = Vec::new();
        for entry in &self.entries {
            let found = entry.candidates().find_map(|candidate| {
                let candidate = fold(candidate);
                folded.iter().position(|h| *h == candidate)
            });

            match found {
                Some(index) => {
                    debug!("column '{}' read from '{}'", entry.canonical, headers[index]);
                    resolved.push((index, entry.canonical.clone()));
                }
                None if entry.required => {
                    return Err(GridError::MissingColumn {
                        column: entry.canonical.clone(),
                        available: headers.to_vec(),
                    });
                }
                None => {
                    debug!("optional column '{}' not present", entry.canonical);
                }
            }
        }
        Ok(resolved)
    }

    /// Resolve the aliases against `table` and return a table containing
    /// only the canonical columns.
    pub fn apply(&self, table: &Table) -> GridResult<Table> {
        let picks = self.resolve(table.columns())?;
        Ok(table.project(&picks))
    }
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}
