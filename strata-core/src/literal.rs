//! SQL literal formatting for data export.
//!
//! Row values arrive as JSON (`row_to_json`) alongside the column's catalog
//! `data_type`; the output is a literal that replays to the same value.

use serde_json::Value;

/// Single-quote a string, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn is_json_type(data_type: &str) -> bool {
    matches!(data_type, "json" | "jsonb")
}

fn is_numeric_type(data_type: &str) -> bool {
    matches!(
        data_type,
        "smallint" | "integer" | "bigint" | "real" | "double precision" | "numeric" | "decimal"
    )
}

/// Decimal text such as `-12.50`, as NUMERIC values arrive in exports.
fn is_decimal_text(value: &str) -> bool {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    let mut parts = unsigned.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    !(whole.is_empty() && fraction.is_empty())
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit())
}

/// Format one exported value as a SQL literal for a column of `data_type`.
pub fn sql_literal(value: &Value, data_type: &str) -> String {
    let data_type = data_type.trim().to_ascii_lowercase();

    if value.is_null() {
        return "NULL".to_string();
    }
    if is_json_type(&data_type) {
        return format!("{}::{}", quote_literal(&value.to_string()), data_type);
    }

    match value {
        Value::Bool(b) => {
            if data_type == "boolean" || data_type.is_empty() {
                b.to_string()
            } else {
                quote_literal(&b.to_string())
            }
        }
        Value::Number(n) => {
            if is_numeric_type(&data_type) || data_type.is_empty() {
                n.to_string()
            } else {
                quote_literal(&n.to_string())
            }
        }
        Value::String(s) if is_numeric_type(&data_type) && is_decimal_text(s) => s.clone(),
        Value::String(s) => {
            // NaN / Infinity come back as strings for float columns.
            quote_literal(s)
        }
        Value::Array(items) if data_type == "array" => {
            if items.is_empty() {
                return "'{}'".to_string();
            }
            let elements: Vec<String> = items.iter().map(|item| sql_literal(item, "")).collect();
            format!("ARRAY[{}]", elements.join(", "))
        }
        Value::Array(_) | Value::Object(_) => quote_literal(&value.to_string()),
        Value::Null => "NULL".to_string(),
    }
}
