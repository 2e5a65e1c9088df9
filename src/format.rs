//! Display projection for result tables.
//!
//! Rounds measure cells to [`DISPLAY_DECIMALS`] places and blanks those that
//! are zero after rounding. Key columns and raw record values pass through
//! unchanged. Only ever applied to copies handed to the presentation layer,
//! after comparison thresholds have been evaluated.

use crate::{data::Value, table::Table};

pub const DISPLAY_DECIMALS: i32 = 4;

// Keeps `value * 10^4` below 2^53 so a second rounding pass is a no-op.
const ROUNDING_LIMIT: f64 = 1e11;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() || value.abs() >= ROUNDING_LIMIT {
        return value;
    }
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn format_cell(cell: &Option<Value>) -> Option<Value> {
    match cell {
        Some(Value::Number(n)) => {
            let rounded = round_to(*n, DISPLAY_DECIMALS);
            (rounded != 0.0).then_some(Value::Number(rounded))
        }
        other => other.clone(),
    }
}

/// Idempotent: `format_table(&format_table(t)) == format_table(t)`.
pub fn format_table(table: &Table) -> Table {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(idx, cell)| {
                    if table.is_measure(idx) {
                        format_cell(cell)
                    } else {
                        cell.clone()
                    }
                })
                .collect()
        })
        .collect();
    Table {
        name: table.name.clone(),
        columns: table.columns.clone(),
        rows,
        measures_from: table.measures_from,
    }
}
