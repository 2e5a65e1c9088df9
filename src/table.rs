use std::borrow::Cow;
use std::fmt::Write as _;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::data::Value;

/// A named grid of cells handed to the presentation layer. `None` is a blank.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<Value>>>,
    /// Columns at or after this index hold measures (counts, sums, diffs);
    /// earlier ones hold keys or raw record values.
    pub measures_from: usize,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            measures_from: columns.len(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_measures_from(mut self, index: usize) -> Self {
        self.measures_from = index.min(self.columns.len());
        self
    }

    pub fn is_measure(&self, column: usize) -> bool {
        column >= self.measures_from && column < self.columns.len()
    }

    pub fn push_row(&mut self, mut cells: Vec<Option<Value>>) {
        cells.resize(self.columns.len(), None);
        self.rows.push(cells);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let numeric = (0..self.columns.len())
            .map(|idx| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(idx).and_then(|c| c.as_ref()))
                    .all(Value::is_number)
            })
            .collect::<Vec<_>>();
        render_table(&self.columns, &self.display_rows(), &numeric)
    }
}

struct RowRecord<'a> {
    columns: &'a [String],
    cells: &'a [Option<Value>],
}

impl Serialize for RowRecord<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

// Tables serialize as `{ name, columns, rows: [{column: value}, ...] }`.
impl Serialize for Table {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let rows = self
            .rows
            .iter()
            .map(|cells| RowRecord {
                columns: &self.columns,
                cells,
            })
            .collect::<Vec<_>>();
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("columns", &self.columns)?;
        map.serialize_entry("rows", &rows)?;
        map.end()
    }
}

/// Renders an aligned plain-text grid. Columns flagged in `right_align` are
/// padded on the left so numbers line up on their last digit.
pub fn render_table(headers: &[String], rows: &[Vec<String>], right_align: &[bool]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &[]));

    let separator_cells = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &widths, &[]));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, right_align));
    }

    output
}

fn format_row(values: &[String], widths: &[usize], right_align: &[bool]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate().take(widths.len()) {
        let sanitized = sanitize_cell(value);
        let padding = " ".repeat(widths[idx].saturating_sub(display_width(&sanitized)));
        if right_align.get(idx).copied().unwrap_or(false) {
            cells.push(format!("{padding}{sanitized}"));
        } else {
            cells.push(format!("{sanitized}{padding}"));
        }
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
