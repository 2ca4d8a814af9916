//! Database Helper Functions
//!
//! Conversions between JSON and PostgreSQL values for the statements that
//! callers supply (raw SQL, bulk upsert). Parameters are bound after
//! `prepare`, using the types the server inferred for each placeholder.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use strata_core::{EngineError, EngineResult};
use tokio_postgres::types::{FromSql, Kind, ToSql, Type};
use tokio_postgres::Row;
use uuid::Uuid;

// ============================================================================
// PARAMETER BINDING
// ============================================================================

/// An owned, typed bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum PgParam {
    Bool(Option<bool>),
    Int2(Option<i16>),
    Int4(Option<i32>),
    Int8(Option<i64>),
    Float4(Option<f32>),
    Float8(Option<f64>),
    Text(Option<String>),
    Uuid(Option<Uuid>),
    Timestamptz(Option<DateTime<Utc>>),
    Timestamp(Option<NaiveDateTime>),
    Date(Option<NaiveDate>),
    Json(Option<Value>),
    Bytea(Option<Vec<u8>>),
}

impl PgParam {
    pub fn as_tosql(&self) -> &(dyn ToSql + Sync) {
        match self {
            PgParam::Bool(value) => value,
            PgParam::Int2(value) => value,
            PgParam::Int4(value) => value,
            PgParam::Int8(value) => value,
            PgParam::Float4(value) => value,
            PgParam::Float8(value) => value,
            PgParam::Text(value) => value,
            PgParam::Uuid(value) => value,
            PgParam::Timestamptz(value) => value,
            PgParam::Timestamp(value) => value,
            PgParam::Date(value) => value,
            PgParam::Json(value) => value,
            PgParam::Bytea(value) => value,
        }
    }
}

/// Borrow a parameter list in the shape `query` expects.
pub fn as_sql_params(params: &[PgParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(PgParam::as_tosql).collect()
}

/// Convert JSON values to parameters of the prepared statement's types.
pub fn bind_params(values: &[Value], types: &[Type]) -> EngineResult<Vec<PgParam>> {
    if values.len() != types.len() {
        return Err(EngineError::invalid_input(format!(
            "Statement expects {} parameter(s), {} provided",
            types.len(),
            values.len()
        )));
    }
    values
        .iter()
        .zip(types)
        .enumerate()
        .map(|(idx, (value, ty))| bind_param(value, ty).map_err(|e| at_position(idx + 1, e)))
        .collect()
}

fn at_position(position: usize, err: EngineError) -> EngineError {
    match err {
        EngineError::InvalidInput { reason } => {
            EngineError::invalid_input(format!("Parameter ${}: {}", position, reason))
        }
        other => other,
    }
}

fn mismatch(value: &Value, ty: &Type) -> EngineError {
    EngineError::invalid_input(format!(
        "cannot bind {} to a {} placeholder",
        json_kind(value),
        ty.name()
    ))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Convert one JSON value. Strings are parsed for non-text types so that
/// CSV cells and JSON strings bind the same way.
pub fn bind_param(value: &Value, ty: &Type) -> EngineResult<PgParam> {
    let is_null = value.is_null();
    let param = match *ty {
        Type::BOOL => PgParam::Bool(if is_null { None } else { Some(to_bool(value, ty)?) }),
        Type::INT2 => PgParam::Int2(if is_null {
            None
        } else {
            Some(
                i16::try_from(to_i64(value, ty)?)
                    .map_err(|_| EngineError::invalid_input("value out of range for int2"))?,
            )
        }),
        Type::INT4 => PgParam::Int4(if is_null {
            None
        } else {
            Some(
                i32::try_from(to_i64(value, ty)?)
                    .map_err(|_| EngineError::invalid_input("value out of range for int4"))?,
            )
        }),
        Type::INT8 => PgParam::Int8(if is_null { None } else { Some(to_i64(value, ty)?) }),
        Type::FLOAT4 => PgParam::Float4(if is_null {
            None
        } else {
            Some(to_f64(value, ty)? as f32)
        }),
        Type::FLOAT8 => PgParam::Float8(if is_null { None } else { Some(to_f64(value, ty)?) }),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            PgParam::Text(match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
        }
        Type::UUID => PgParam::Uuid(match value {
            Value::Null => None,
            Value::String(s) => Some(
                Uuid::parse_str(s.trim())
                    .map_err(|e| EngineError::invalid_input(format!("invalid uuid: {}", e)))?,
            ),
            other => return Err(mismatch(other, ty)),
        }),
        Type::TIMESTAMPTZ => PgParam::Timestamptz(match value {
            Value::Null => None,
            Value::String(s) => Some(parse_timestamptz(s)?),
            other => return Err(mismatch(other, ty)),
        }),
        Type::TIMESTAMP => PgParam::Timestamp(match value {
            Value::Null => None,
            Value::String(s) => Some(parse_timestamp(s)?),
            other => return Err(mismatch(other, ty)),
        }),
        Type::DATE => PgParam::Date(match value {
            Value::Null => None,
            Value::String(s) => Some(
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map_err(|e| EngineError::invalid_input(format!("invalid date: {}", e)))?,
            ),
            other => return Err(mismatch(other, ty)),
        }),
        Type::JSON | Type::JSONB => PgParam::Json(match value {
            Value::Null => None,
            // CSV cells carry JSON as text
            Value::String(s) => Some(serde_json::from_str(s).unwrap_or_else(|_| value.clone())),
            other => Some(other.clone()),
        }),
        Type::BYTEA => PgParam::Bytea(match value {
            Value::Null => None,
            Value::String(s) => Some(decode_bytea(s)?),
            other => return Err(mismatch(other, ty)),
        }),
        _ => {
            return Err(EngineError::invalid_input(format!(
                "placeholders of type {} are not supported; cast the placeholder, e.g. $1::text::{}",
                ty.name(),
                ty.name()
            )))
        }
    };
    Ok(param)
}

fn to_bool(value: &Value, ty: &Type) -> EngineResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "1" => Ok(true),
            "false" | "f" | "no" | "0" => Ok(false),
            _ => Err(EngineError::invalid_input(format!("invalid boolean '{}'", s))),
        },
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        other => Err(mismatch(other, ty)),
    }
}

fn to_i64(value: &Value, ty: &Type) -> EngineResult<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| EngineError::invalid_input(format!("{} is not an integer", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| EngineError::invalid_input(format!("'{}' is not an integer", s))),
        other => Err(mismatch(other, ty)),
    }
}

fn to_f64(value: &Value, ty: &Type) -> EngineResult<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EngineError::invalid_input(format!("{} is not a number", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| EngineError::invalid_input(format!("'{}' is not a number", s))),
        other => Err(mismatch(other, ty)),
    }
}

fn parse_timestamptz(raw: &str) -> EngineResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    parse_timestamp(raw).map(|naive| naive.and_utc())
}

fn parse_timestamp(raw: &str) -> EngineResult<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
    }
    Err(EngineError::invalid_input(format!("invalid timestamp '{}'", raw)))
}

/// `\x`-prefixed hex is decoded, anything else is taken as UTF-8 bytes.
fn decode_bytea(raw: &str) -> EngineResult<Vec<u8>> {
    let Some(hex) = raw.strip_prefix("\\x") else {
        return Ok(raw.as_bytes().to_vec());
    };
    if hex.len() % 2 != 0 {
        return Err(EngineError::invalid_input("bytea hex input has an odd length"));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| EngineError::invalid_input("invalid bytea hex input"))
        })
        .collect()
}

fn encode_bytea(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

// ============================================================================
// ROW CONVERSION
// ============================================================================

/// Column metadata returned alongside raw SQL rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    pub data_type: String,
}

pub fn fields_of(columns: &[tokio_postgres::Column]) -> Vec<FieldInfo> {
    columns
        .iter()
        .map(|c| FieldInfo {
            name: c.name().to_string(),
            data_type: c.type_().name().to_string(),
        })
        .collect()
}

/// Convert a row into a JSON object keyed by column name.
pub fn row_to_json(row: &Row) -> EngineResult<Map<String, Value>> {
    let mut object = Map::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let cell = row.try_get::<_, Option<JsonCell>>(idx).map_err(|e| {
            EngineError::sql(format!(
                "cannot read column '{}' of type {}: {}",
                column.name(),
                column.type_().name(),
                e
            ))
        })?;
        object.insert(column.name().to_string(), cell.map_or(Value::Null, |c| c.0));
    }
    Ok(object)
}

/// Whether every column of a result can be read by [`row_to_json`].
pub fn decodes_all(columns: &[tokio_postgres::Column]) -> bool {
    columns.iter().all(|c| decodes(c.type_()))
}

/// Types [`JsonCell`] reads from the binary result format.
pub fn decodes(ty: &Type) -> bool {
    match *ty {
        Type::BOOL
        | Type::CHAR
        | Type::INT2
        | Type::INT4
        | Type::INT8
        | Type::OID
        | Type::FLOAT4
        | Type::FLOAT8
        | Type::NUMERIC
        | Type::UUID
        | Type::TIMESTAMPTZ
        | Type::TIMESTAMP
        | Type::DATE
        | Type::TIME
        | Type::INTERVAL
        | Type::JSON
        | Type::JSONB
        | Type::BYTEA => true,
        _ => match ty.kind() {
            Kind::Enum(_) => true,
            Kind::Domain(inner) => decodes(inner),
            Kind::Array(member) => decodes(member),
            _ => <&str as FromSql<'_>>::accepts(ty),
        },
    }
}

/// One result cell decoded straight to JSON.
///
/// NUMERIC and INTERVAL are rendered as strings in PostgreSQL's text form,
/// so no value is rounded through a float.
struct JsonCell(Value);

type DecodeError = Box<dyn std::error::Error + Sync + Send>;

impl<'a> FromSql<'a> for JsonCell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        let value = match *ty {
            Type::BOOL => Value::from(bool::from_sql(ty, raw)?),
            Type::CHAR => Value::from(i8::from_sql(ty, raw)?),
            Type::INT2 => Value::from(i16::from_sql(ty, raw)?),
            Type::INT4 => Value::from(i32::from_sql(ty, raw)?),
            Type::INT8 => Value::from(i64::from_sql(ty, raw)?),
            Type::OID => Value::from(u32::from_sql(ty, raw)?),
            Type::FLOAT4 => float_to_json(f64::from(f32::from_sql(ty, raw)?)),
            Type::FLOAT8 => float_to_json(f64::from_sql(ty, raw)?),
            Type::NUMERIC => Value::String(decode_numeric(raw)?),
            Type::UUID => Value::String(Uuid::from_sql(ty, raw)?.to_string()),
            Type::TIMESTAMPTZ => Value::String(DateTime::<Utc>::from_sql(ty, raw)?.to_rfc3339()),
            Type::TIMESTAMP => Value::String(NaiveDateTime::from_sql(ty, raw)?.to_string()),
            Type::DATE => Value::String(NaiveDate::from_sql(ty, raw)?.to_string()),
            Type::TIME => Value::String(NaiveTime::from_sql(ty, raw)?.to_string()),
            Type::INTERVAL => Value::String(decode_interval(raw)?),
            Type::JSON | Type::JSONB => Value::from_sql(ty, raw)?,
            Type::BYTEA => Value::String(encode_bytea(raw)),
            _ => match ty.kind() {
                Kind::Enum(_) => Value::String(std::str::from_utf8(raw)?.to_string()),
                Kind::Domain(inner) => JsonCell::from_sql(inner, raw)?.0,
                Kind::Array(_) => Value::Array(
                    Vec::<Option<JsonCell>>::from_sql(ty, raw)?
                        .into_iter()
                        .map(|cell| cell.map_or(Value::Null, |c| c.0))
                        .collect(),
                ),
                _ => Value::String(<&str>::from_sql(ty, raw)?.to_string()),
            },
        };
        Ok(JsonCell(value))
    }

    fn accepts(ty: &Type) -> bool {
        decodes(ty)
    }
}

fn float_to_json(value: f64) -> Value {
    if value.is_nan() {
        Value::String("NaN".to_string())
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        Value::String(text.to_string())
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

fn read_i16(raw: &[u8], at: usize) -> Result<i16, DecodeError> {
    raw.get(at..at + 2)
        .map(|b| i16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "truncated value".into())
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render a binary NUMERIC exactly, keeping its display scale.
///
/// The wire form is a header (digit count, weight, sign, scale) followed by
/// base-10000 digits, the first of which is worth `10000^weight`.
fn decode_numeric(raw: &[u8]) -> Result<String, DecodeError> {
    let ndigits = usize::try_from(read_i16(raw, 0)?).map_err(|_| "invalid numeric digit count")?;
    let weight = i32::from(read_i16(raw, 2)?);
    let sign = read_i16(raw, 4)? as u16;
    let dscale = usize::try_from(read_i16(raw, 6)?).map_err(|_| "invalid numeric scale")?;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }
    if raw.len() != 8 + ndigits * 2 {
        return Err("invalid numeric length".into());
    }
    let digits = (0..ndigits)
        .map(|i| read_i16(raw, 8 + i * 2))
        .collect::<Result<Vec<_>, _>>()?;
    let digit = |position: i32| -> i16 {
        usize::try_from(position)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit(0).to_string());
        for position in 1..=weight {
            out.push_str(&format!("{:04}", digit(position)));
        }
    }
    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut position = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit(position)));
            position += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

/// Render a binary INTERVAL (microseconds, days, months) the way the server
/// prints it, e.g. `1 year 2 mons 3 days 04:05:06.5`.
fn decode_interval(raw: &[u8]) -> Result<String, DecodeError> {
    let bytes: [u8; 16] = raw.try_into().map_err(|_| "invalid interval length")?;
    let micros = i64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]);
    let days = i32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let months = i32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    let unit = |n: i32, singular: &str, plural: &str| {
        format!("{} {}", n, if n.abs() == 1 { singular } else { plural })
    };
    let mut parts = Vec::new();
    if months / 12 != 0 {
        parts.push(unit(months / 12, "year", "years"));
    }
    if months % 12 != 0 {
        parts.push(unit(months % 12, "mon", "mons"));
    }
    if days != 0 {
        parts.push(unit(days, "day", "days"));
    }
    if micros != 0 || parts.is_empty() {
        let total = micros.unsigned_abs();
        let seconds = total / 1_000_000;
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            if micros < 0 { "-" } else { "" },
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        );
        let fraction = total % 1_000_000;
        if fraction != 0 {
            time.push('.');
            time.push_str(format!("{:06}", fraction).trim_end_matches('0'));
        }
        parts.push(time);
    }
    Ok(parts.join(" "))
}
