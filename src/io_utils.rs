//! I/O utilities for loading datasets and writing result tables.
//!
//! All file I/O in csv-rollup flows through this module:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Dataset loading**: CSV (typed column-by-column) and JSON record arrays.
//! - **stdin**: the `-` path convention reads CSV from standard input.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use serde_json::Value as JsonValue;

use crate::{
    data::{Dataset, Value, parse_cell},
    schema,
    table::Table,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn is_json(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("json")
    )
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader)
}

pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        Ok(Box::new(std::io::stdin().lock()))
    } else {
        Ok(Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        )))
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Loads a dataset, choosing JSON for `.json` paths and CSV otherwise.
pub fn read_dataset(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Dataset> {
    if is_json(path) {
        read_json_dataset(path)
    } else {
        let delimiter = resolve_input_delimiter(path, delimiter);
        read_csv_dataset(open_input(path)?, delimiter, encoding)
            .with_context(|| format!("Reading CSV dataset {path:?}"))
    }
}

/// Reads every row, then types each column: a non-reserved column is numeric
/// when all of its non-empty cells parse as numbers. Placeholder tokens such
/// as `NA` or `null` become nulls.
pub fn read_csv_dataset<R>(
    input: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Dataset>
where
    R: Read,
{
    let mut reader = open_csv_reader(input, delimiter);
    let headers = decode_record(reader.byte_headers()?, encoding)?;
    let mut raw_rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        raw_rows.push(decoded);
    }

    let kinds = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            schema::infer_raw_kind(name, raw_rows.iter().map(|row| row[idx].as_str()))
        })
        .collect::<Vec<_>>();
    debug!(
        "Inferred CSV column kinds: {:?}",
        headers.iter().zip(&kinds).collect::<Vec<_>>()
    );

    let rows: Vec<Vec<Option<Value>>> = raw_rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&kinds)
                .map(|(cell, kind)| {
                    if schema::is_placeholder_token(cell) {
                        None
                    } else {
                        parse_cell(cell, *kind)
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect();
    Ok(Dataset::from_rows(&headers, rows))
}

pub fn read_json_dataset(path: &Path) -> Result<Dataset> {
    let raw = fs::read_to_string(path).with_context(|| format!("Reading JSON file {path:?}"))?;
    parse_json_dataset(&raw).with_context(|| format!("Parsing JSON dataset {path:?}"))
}

/// Parses an array of flat objects. Field order follows first appearance;
/// missing keys are nulls.
pub fn parse_json_dataset(raw: &str) -> Result<Dataset> {
    let parsed: JsonValue = serde_json::from_str(raw).context("Invalid JSON")?;
    let JsonValue::Array(items) = parsed else {
        bail!("Expected a JSON array of records");
    };
    let mut fields: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let JsonValue::Object(map) = item else {
            bail!("Record {} is not a JSON object", idx + 1);
        };
        for key in map.keys() {
            if !fields.contains(key) {
                fields.push(key.clone());
            }
        }
        objects.push(map);
    }
    let rows = objects
        .iter()
        .enumerate()
        .map(|(idx, map)| {
            fields
                .iter()
                .map(|field| match map.get(field) {
                    None => Ok(None),
                    Some(value) => json_cell(value)
                        .with_context(|| format!("Record {} field '{field}'", idx + 1)),
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Dataset::from_rows(&fields, rows))
}

fn json_cell(value: &JsonValue) -> Result<Option<Value>> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Bool(b) => Ok(Some(Value::Text(b.to_string()))),
        JsonValue::Number(n) => n
            .as_f64()
            .map(|f| Some(Value::Number(f)))
            .ok_or_else(|| anyhow!("Number {n} is out of range")),
        JsonValue::String(s) => Ok(Some(Value::Text(s.clone()))),
        JsonValue::Array(_) | JsonValue::Object(_) => {
            bail!("Nested values are not supported")
        }
    }
}

/// Writes a table as CSV with a header row. Blank cells are written empty.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    let mut writer = csv::WriterBuilder::new().from_writer(BufWriter::new(file));
    writer
        .write_record(&table.columns)
        .with_context(|| format!("Writing headers to {path:?}"))?;
    for row in table.display_rows() {
        writer
            .write_record(&row)
            .with_context(|| format!("Writing row to {path:?}"))?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}

pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;
    use std::path::PathBuf;

    fn field_kinds(dataset: &Dataset) -> Vec<FieldKind> {
        dataset.schema().fields().iter().map(|f| f.kind).collect()
    }

    #[test]
    fn delimiter_follows_extension() {
        assert_eq!(resolve_input_delimiter(&PathBuf::from("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(&PathBuf::from("a.csv"), None), b',');
        assert_eq!(
            resolve_input_delimiter(&PathBuf::from("a.tsv"), Some(b';')),
            b';'
        );
    }

    #[test]
    fn csv_columns_are_typed_as_a_whole() {
        let input = "Region,Currency,Amt,Code,Error\n\
                     west,USD,10.5,7,\n\
                     east,840,NA,x9,timeout\n";
        let dataset = read_csv_dataset(input.as_bytes(), b',', UTF_8).expect("read csv");
        assert_eq!(
            field_kinds(&dataset),
            vec![
                FieldKind::Text,
                FieldKind::Text,
                FieldKind::Number,
                FieldKind::Text,
                FieldKind::Text
            ]
        );
        let second = &dataset.records()[1];
        assert_eq!(second.get(1), Some(&Value::text("840")));
        assert_eq!(second.get(2), None);
        assert_eq!(dataset.records()[0].get(4), None);
    }

    #[test]
    fn infinity_tokens_keep_a_column_textual() {
        let input = "Tag,Currency,Amt\ninf,USD,1\n-Infinity,USD,2\n";
        let dataset = read_csv_dataset(input.as_bytes(), b',', UTF_8).expect("read csv");
        assert_eq!(
            field_kinds(&dataset),
            vec![FieldKind::Text, FieldKind::Text, FieldKind::Number]
        );
        assert_eq!(dataset.records()[0].get(0), Some(&Value::text("inf")));
    }

    #[test]
    fn json_records_allow_mixed_columns() {
        let raw = r#"[
            {"Region": "west", "Currency": "USD", "Amt": 10},
            {"Region": 5, "Currency": "USD", "Error": null, "Flag": true}
        ]"#;
        let dataset = parse_json_dataset(raw).expect("parse json");
        assert_eq!(
            dataset.schema().field_names(),
            vec!["Region", "Currency", "Amt", "Error", "Flag"]
        );
        assert_eq!(
            field_kinds(&dataset),
            vec![
                FieldKind::Mixed,
                FieldKind::Text,
                FieldKind::Number,
                FieldKind::Empty,
                FieldKind::Text
            ]
        );
    }

    #[test]
    fn json_rejects_nested_values() {
        let raw = r#"[{"Currency": "USD", "Meta": {"a": 1}}]"#;
        let err = parse_json_dataset(raw).unwrap_err();
        assert!(format!("{err:#}").contains("Nested values"));
    }
}
