//! Upload parsing and parameterized INSERT / upsert building.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::identifier::{quote_ident, quote_qualified, validate_identifier, IdentifierKind};

/// PostgreSQL's bind parameter limit per statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Json,
}

impl UploadFormat {
    pub fn from_filename(filename: &str) -> EngineResult<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Ok(UploadFormat::Csv)
        } else if lower.ends_with(".json") {
            Ok(UploadFormat::Json)
        } else {
            Err(EngineError::invalid_input(format!(
                "Unsupported file type '{}': expected a .csv or .json file",
                filename
            )))
        }
    }
}

/// Parsed upload: a column list and rows aligned to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

fn empty_to_null(value: Value) -> Value {
    match value {
        Value::String(s) if s.is_empty() => Value::Null,
        other => other,
    }
}

pub fn parse_records(bytes: &[u8], filename: &str) -> EngineResult<RecordBatch> {
    let batch = match UploadFormat::from_filename(filename)? {
        UploadFormat::Csv => parse_csv(bytes)?,
        UploadFormat::Json => parse_json(bytes)?,
    };
    if batch.is_empty() {
        return Err(EngineError::invalid_input("File contains no records"));
    }
    for column in &batch.columns {
        validate_identifier(column, IdentifierKind::Column)?;
    }
    Ok(batch)
}

fn parse_csv(bytes: &[u8]) -> EngineResult<RecordBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| EngineError::invalid_input(format!("Invalid CSV header: {}", e)))?
        .clone();
    let columns: Vec<String> = headers.iter().map(str::to_string).collect();
    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(EngineError::invalid_input("CSV file must start with a header row"));
    }
    ensure_unique_columns(&columns)?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            EngineError::invalid_input(format!("Invalid CSV record {}: {}", line + 1, e))
        })?;
        rows.push(
            record
                .iter()
                .map(|field| empty_to_null(Value::String(field.to_string())))
                .collect(),
        );
    }
    Ok(RecordBatch { columns, rows })
}

fn parse_json(bytes: &[u8]) -> EngineResult<RecordBatch> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| EngineError::invalid_input(format!("Invalid JSON file: {}", e)))?;
    let objects: Vec<Map<String, Value>> = match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(map) => Ok(map),
                _ => Err(EngineError::invalid_input(format!(
                    "JSON record {} is not an object",
                    idx + 1
                ))),
            })
            .collect::<EngineResult<_>>()?,
        Value::Object(map) => vec![map],
        _ => {
            return Err(EngineError::invalid_input(
                "JSON file must contain an object or an array of objects",
            ))
        }
    };

    let mut columns: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = objects
        .into_iter()
        .map(|mut object| {
            columns
                .iter()
                .map(|column| empty_to_null(object.remove(column).unwrap_or(Value::Null)))
                .collect()
        })
        .collect();
    Ok(RecordBatch { columns, rows })
}

fn ensure_unique_columns(columns: &[String]) -> EngineResult<()> {
    let mut seen = HashMap::new();
    for column in columns {
        if seen.insert(column.as_str(), ()).is_some() {
            return Err(EngineError::invalid_input(format!(
                "Column '{}' appears more than once",
                column
            )));
        }
    }
    Ok(())
}

// ============================================================================
// INSERT BUILDING
// ============================================================================

/// A rendered statement with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub params: Vec<Value>,
    pub row_count: usize,
}

/// Identity of an upsert key cell as the server will compare it. Scalars
/// compare by their text form so `1` and `"1"` are one key. NULL keys never
/// conflict and get no identity.
fn conflict_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Build the INSERT (or upsert) statements for `batch`.
///
/// Rows are chunked only when a single statement would exceed the bind
/// parameter limit. With an upsert key, later records win over earlier
/// ones sharing the same key; records with a NULL key are all kept.
pub fn build_inserts(
    schema: &str,
    table: &str,
    batch: &RecordBatch,
    upsert_key: Option<&str>,
) -> EngineResult<Vec<InsertStatement>> {
    validate_identifier(table, IdentifierKind::Table)?;
    if batch.is_empty() || batch.columns.is_empty() {
        return Err(EngineError::invalid_input("File contains no records"));
    }

    let key_index = match upsert_key {
        Some(key) => {
            validate_identifier(key, IdentifierKind::Column)?;
            Some(batch.column_index(key).ok_or_else(|| {
                EngineError::invalid_input(format!(
                    "Upsert key '{}' is not a column in the uploaded records",
                    key
                ))
            })?)
        }
        None => None,
    };

    let rows: Vec<&Vec<Value>> = match key_index {
        Some(idx) => {
            let mut position: HashMap<String, usize> = HashMap::new();
            let mut deduped: Vec<&Vec<Value>> = Vec::with_capacity(batch.rows.len());
            for row in &batch.rows {
                let Some(key) = conflict_key(&row[idx]) else {
                    deduped.push(row);
                    continue;
                };
                match position.get(&key) {
                    Some(&at) => deduped[at] = row,
                    None => {
                        position.insert(key, deduped.len());
                        deduped.push(row);
                    }
                }
            }
            deduped
        }
        None => batch.rows.iter().collect(),
    };

    let column_list = batch
        .columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let conflict_clause = key_index.map(|idx| {
        let key = &batch.columns[idx];
        let updates: Vec<String> = batch
            .columns
            .iter()
            .filter(|c| *c != key)
            .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
            .collect();
        if updates.is_empty() {
            format!(" ON CONFLICT ({}) DO NOTHING", quote_ident(key))
        } else {
            format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                quote_ident(key),
                updates.join(", ")
            )
        }
    });

    let width = batch.columns.len();
    let rows_per_statement = (MAX_BIND_PARAMS / width).max(1);
    let relation = quote_qualified(schema, table);

    let statements = rows
        .chunks(rows_per_statement)
        .map(|chunk| {
            let mut params = Vec::with_capacity(chunk.len() * width);
            let mut tuples = Vec::with_capacity(chunk.len());
            for row in chunk {
                let placeholders: Vec<String> = (0..width)
                    .map(|col| format!("${}", params.len() + col + 1))
                    .collect();
                tuples.push(format!("({})", placeholders.join(", ")));
                params.extend(row.iter().cloned());
            }
            InsertStatement {
                sql: format!(
                    "INSERT INTO {} ({}) VALUES {}{}",
                    relation,
                    column_list,
                    tuples.join(", "),
                    conflict_clause.as_deref().unwrap_or("")
                ),
                params,
                row_count: chunk.len(),
            }
        })
        .collect();
    Ok(statements)
}
