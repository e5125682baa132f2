//! Numeric column detection.
//!
//! A column counts as numeric when *any* row holds a value that parses as a
//! finite float. Cells that do not parse inside a numeric column are plotted
//! as `0` rather than dropped, so every trace keeps one point per row.

use crate::ingest::RowRecord;

/// Parse a cell as a finite float, ignoring surrounding whitespace
pub fn parse_numeric(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a cell, falling back to `0.0`
pub fn coerce_numeric(value: &str) -> f64 {
    parse_numeric(value).unwrap_or(0.0)
}

pub fn is_numeric_column(rows: &[RowRecord], column: &str) -> bool {
    rows.iter()
        .any(|row| row.get(column).and_then(parse_numeric).is_some())
}

/// The selected columns that are numeric, in selection order
pub fn numeric_columns<'a>(rows: &[RowRecord], selection: &'a [String]) -> Vec<&'a str> {
    selection
        .iter()
        .map(String::as_str)
        .filter(|column| is_numeric_column(rows, column))
        .collect()
}

/// One coerced value per row for `column`
pub fn numeric_values(rows: &[RowRecord], column: &str) -> Vec<f64> {
    rows.iter()
        .map(|row| row.get(column).map(coerce_numeric).unwrap_or(0.0))
        .collect()
}
