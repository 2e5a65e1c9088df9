//! Dataset schema, field-kind inference, and categorical/numeric classification.
//!
//! A [`Schema`] is the ordered list of typed [`Field`]s shared by every record
//! of a [`Dataset`]. Kinds are inferred once from the observed values and never
//! re-evaluated. [`classify`] then splits the non-reserved fields into
//! [`FieldRoles`]:
//!
//! - **categorical**: fewer than `category_threshold` distinct non-null values
//! - **numeric**: every non-null value is a number
//!
//! The two roles are independent, so a low-cardinality integer code is both.
//! `Currency` and `Error` are reserved and never receive a role.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{
    data::{Dataset, Record, Value, parse_number},
    error::SchemaError,
};

pub const CURRENCY_FIELD: &str = "Currency";
pub const ERROR_FIELD: &str = "Error";
pub const RESERVED_FIELDS: &[&str] = &[CURRENCY_FIELD, ERROR_FIELD];
pub const DEFAULT_CATEGORY_THRESHOLD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Number,
    Text,
    /// Both numbers and text were observed.
    Mixed,
    /// Only nulls were observed.
    Empty,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Number => "number",
            FieldKind::Text => "text",
            FieldKind::Mixed => "mixed",
            FieldKind::Empty => "empty",
        }
    }

    fn observe(self, value: &Value) -> Self {
        match (self, value.is_number()) {
            (FieldKind::Empty, true) => FieldKind::Number,
            (FieldKind::Empty, false) => FieldKind::Text,
            (FieldKind::Number, false) | (FieldKind::Text, true) => FieldKind::Mixed,
            (kind, _) => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn infer<S>(field_names: &[S], records: &[Record]) -> Self
    where
        S: AsRef<str>,
    {
        let mut kinds = vec![FieldKind::Empty; field_names.len()];
        for record in records {
            for (idx, kind) in kinds.iter_mut().enumerate() {
                if let Some(value) = record.get(idx) {
                    *kind = kind.observe(value);
                }
            }
        }
        let fields = field_names
            .iter()
            .zip(kinds)
            .map(|(name, kind)| Field {
                name: name.as_ref().to_string(),
                kind,
            })
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn require(&self, name: &str) -> Result<usize, SchemaError> {
        self.field_index(name)
            .ok_or_else(|| SchemaError::MissingField {
                field: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Tokens that CSV producers commonly write in place of an empty cell.
pub(crate) fn is_placeholder_token(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    matches!(
        lowered.as_str(),
        "na" | "n/a" | "nan" | "null" | "none" | "<na>"
    )
}

/// Decides whether a raw text column is numeric: every non-empty,
/// non-placeholder cell must parse as a float. Reserved fields stay text.
pub(crate) fn infer_raw_kind<'a, I>(name: &str, cells: I) -> FieldKind
where
    I: IntoIterator<Item = &'a str>,
{
    if is_reserved(name) {
        return FieldKind::Text;
    }
    let mut kind = FieldKind::Empty;
    for cell in cells {
        let trimmed = cell.trim();
        if trimmed.is_empty() || is_placeholder_token(trimmed) {
            continue;
        }
        if parse_number(trimmed).is_none() {
            return FieldKind::Text;
        }
        kind = FieldKind::Number;
    }
    kind
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRef {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldRoles {
    pub categories: Vec<FieldRef>,
    pub numerics: Vec<FieldRef>,
}

impl FieldRoles {
    pub fn is_categorical(&self, name: &str) -> bool {
        self.categories.iter().any(|f| f.name == name)
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.numerics.iter().any(|f| f.name == name)
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn numeric_names(&self) -> Vec<&str> {
        self.numerics.iter().map(|f| f.name.as_str()).collect()
    }
}

pub fn distinct_count<'a, I>(records: I, index: usize) -> usize
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter_map(|r| r.get(index))
        .collect::<HashSet<_>>()
        .len()
}

/// Splits the dataset's non-reserved fields into categorical and numeric roles.
pub fn classify(dataset: &Dataset, category_threshold: usize) -> FieldRoles {
    let mut roles = FieldRoles::default();
    if dataset.is_empty() {
        return roles;
    }
    for (index, field) in dataset.schema().fields().iter().enumerate() {
        if is_reserved(&field.name) {
            continue;
        }
        let field_ref = FieldRef {
            index,
            name: field.name.clone(),
        };
        if distinct_count(dataset.records(), index) < category_threshold {
            roles.categories.push(field_ref.clone());
        }
        if field.kind == FieldKind::Number {
            roles.numerics.push(field_ref);
        }
    }
    roles
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProfile {
    pub name: String,
    pub kind: FieldKind,
    pub distinct: usize,
    pub reserved: bool,
    pub categorical: bool,
    pub numeric: bool,
    /// Distinct values and their counts, most frequent first. Only populated
    /// for categorical fields.
    pub distribution: Vec<(Value, usize)>,
}

/// Describes every field of the dataset with the roles [`classify`] assigns.
pub fn profile_fields(dataset: &Dataset, category_threshold: usize) -> Vec<FieldProfile> {
    let roles = classify(dataset, category_threshold);
    dataset
        .schema()
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let categorical = roles.is_categorical(&field.name);
            FieldProfile {
                name: field.name.clone(),
                kind: field.kind,
                distinct: distinct_count(dataset.records(), index),
                reserved: is_reserved(&field.name),
                categorical,
                numeric: roles.is_numeric(&field.name),
                distribution: if categorical {
                    value_distribution(dataset.records(), index)
                } else {
                    Vec::new()
                },
            }
        })
        .collect()
}

pub fn value_distribution(records: &[Record], index: usize) -> Vec<(Value, usize)> {
    let mut order = Vec::new();
    let mut counts: HashMap<&Value, usize> = HashMap::new();
    for value in records.iter().filter_map(|r| r.get(index)) {
        let entry = counts.entry(value).or_insert_with(|| {
            order.push(value);
            0
        });
        *entry += 1;
    }
    let mut items = order
        .into_iter()
        .map(|value| (value.clone(), counts[value]))
        .collect::<Vec<_>>();
    items.sort_by(|a, b| b.1.cmp(&a.1));
    items
}
