use std::{
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Serialize, Serializer};

use crate::schema::{FieldKind, Schema};

/// A single non-null cell. Nulls are represented as `None` at the record level.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
        }
    }

    fn number_bits(n: f64) -> u64 {
        if n == 0.0 {
            0.0f64.to_bits()
        } else if n.is_nan() {
            f64::NAN.to_bits()
        } else {
            n.to_bits()
        }
    }
}

// Numbers compare by canonical bit pattern so values can key hash maps.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Self::number_bits(*a) == Self::number_bits(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Number(n) => {
                0u8.hash(state);
                Self::number_bits(*n).hash(state);
            }
            Value::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

/// Shortest text that reads back as `value`. Rounding for display belongs to
/// [`crate::format`], not here.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// Parses a finite number; `inf` and `NaN` spellings are not numbers.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// One row of a [`Dataset`], positionally aligned with its [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    values: Vec<Option<Value>>,
}

impl Record {
    pub fn new(values: Vec<Option<Value>>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|v| v.as_ref())
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    schema: Schema,
    records: Vec<Record>,
}

impl Dataset {
    /// Builds a dataset from named columns and positional rows, inferring each
    /// field's kind from the observed values. Short rows are padded with nulls.
    pub fn from_rows<S>(field_names: &[S], rows: Vec<Vec<Option<Value>>>) -> Self
    where
        S: AsRef<str>,
    {
        let width = field_names.len();
        let records = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                Record::new(row)
            })
            .collect::<Vec<_>>();
        let schema = Schema::infer(field_names, &records);
        Self { schema, records }
    }

    pub fn empty() -> Self {
        Self {
            schema: Schema::default(),
            records: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parses a raw text cell for a field of the given kind. Empty cells are null.
pub fn parse_cell(raw: &str, kind: FieldKind) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match kind {
        FieldKind::Number => parse_number(trimmed)
            .map(Value::Number)
            .or_else(|| Some(Value::text(raw))),
        _ => Some(Value::text(raw)),
    }
}
