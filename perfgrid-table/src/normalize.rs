// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Record normalisation.
//!
//! Categorical columns are trimmed and lower-cased, numeric columns are
//! coerced to numbers. A numeric field that does not parse to a finite value
//! becomes [`Cell::Missing`]; normalisation itself never fails.
//!
//! Normalising an already-normalised table returns it unchanged.

use crate::cell::Cell;
use crate::table::Table;

/// Replace any label of `column` containing `needle` with `canonical`.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelRule {
    pub column: String,
    pub needle: String,
    pub canonical: String,
}

#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    categorical: Vec<String>,
    numeric: Vec<String>,
    label_rules: Vec<LabelRule>,
}

impl Normalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn categorical(mut self, columns: &[&str]) -> Self {
        self.categorical.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    #[must_use]
    pub fn numeric(mut self, columns: &[&str]) -> Self {
        self.numeric.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Add a label canonicalisation rule.
    ///
    /// Rules are tried in the order they were added, after lower-casing, and
    /// the first match wins. `canonical` must contain `needle` so that the
    /// rule is stable under repeated normalisation.
    #[must_use]
    pub fn canonical_label(mut self, column: &str, needle: &str, canonical: &str) -> Self {
        debug_assert!(canonical.contains(needle));
        self.label_rules.push(LabelRule {
            column: column.to_string(),
            needle: needle.to_lowercase(),
            canonical: canonical.to_string(),
        });
        self
    }

    /// Return a normalised copy of `table`. Columns the normalizer does not
    /// know about, or that the table does not have, are left alone.
    #[must_use]
    pub fn normalize(&self, table: &Table) -> Table {
        let mut normalized = table.clone();

        let categorical: Vec<(usize, Vec<&LabelRule>)> = self
            .categorical
            .iter()
            .filter_map(|name| {
                let index = table.column_index(name)?;
                let rules = self
                    .label_rules
                    .iter()
                    .filter(|rule| rule.column == *name)
                    .collect();
                Some((index, rules))
            })
            .collect();
        let numeric: Vec<usize> = self
            .numeric
            .iter()
            .filter_map(|name| table.column_index(name))
            .collect();

        for row in normalized.rows_mut() {
            for (index, rules) in &categorical {
                row[*index] = normalize_label(&row[*index], rules);
            }
            for index in &numeric {
                row[*index] = coerce_number(&row[*index]);
            }
        }
        normalized
    }
}

fn normalize_label(cell: &Cell, rules: &[&LabelRule]) -> Cell {
    let label = match cell {
        Cell::Label(label) => label.trim().to_lowercase(),
        Cell::Number(value) => value.to_string(),
        Cell::Missing => return Cell::Missing,
    };
    if label.is_empty() {
        return Cell::Missing;
    }

    match rules.iter().find(|rule| label.contains(&rule.needle)) {
        Some(rule) => Cell::Label(rule.canonical.clone()),
        None => Cell::Label(label),
    }
}

/// Parse a cell as a finite number.
#[must_use]
pub fn coerce_number(cell: &Cell) -> Cell {
    match cell {
        Cell::Number(value) if value.is_finite() => Cell::Number(*value),
        Cell::Label(label) => match label.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Cell::Number(value),
            _ => Cell::Missing,
        },
        _ => Cell::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_trimmed_and_lowered() {
        let rules = [];
        assert_eq!(
            normalize_label(&Cell::from("  SAXPY "), &rules),
            Cell::from("saxpy")
        );
        assert_eq!(normalize_label(&Cell::from("   "), &rules), Cell::Missing);
    }

    #[test]
    fn first_matching_rule_wins() {
        let seq = LabelRule {
            column: "pattern".to_string(),
            needle: "seq".to_string(),
            canonical: "seq".to_string(),
        };
        let rand = LabelRule {
            column: "pattern".to_string(),
            needle: "rand".to_string(),
            canonical: "rand".to_string(),
        };
        let rules = [&seq, &rand];
        assert_eq!(
            normalize_label(&Cell::from("Sequential"), &rules),
            Cell::from("seq")
        );
        assert_eq!(
            normalize_label(&Cell::from("RANDOM"), &rules),
            Cell::from("rand")
        );
        assert_eq!(
            normalize_label(&Cell::from("strided"), &rules),
            Cell::from("strided")
        );
    }

    #[test]
    fn non_finite_text_is_missing() {
        assert_eq!(coerce_number(&Cell::from(" 1.5 ")), Cell::Number(1.5));
        assert_eq!(coerce_number(&Cell::from("nan")), Cell::Missing);
        assert_eq!(coerce_number(&Cell::from("inf")), Cell::Missing);
        assert_eq!(coerce_number(&Cell::from("12ms")), Cell::Missing);
        assert_eq!(coerce_number(&Cell::Number(f64::NAN)), Cell::Missing);
    }
}
