//! Value checks shared by every store. A value reaches storage only after it has been
//! coerced to its column's kind, the way the column's PostgreSQL cast would.

use crate::config::{ColumnInfo, ColumnKind, ResolvedTable};
use crate::error::AppError;
use crate::store::Row;
use serde_json::Value;

/// Coerce one value for `col`. Integers must fit `int4`; text respects varchar length and
/// enum labels; arrays and objects are never accepted.
pub fn coerce(col: &ColumnInfo, v: &Value) -> Result<Value, AppError> {
    match (col.kind, v) {
        (_, Value::Null) => Ok(Value::Null),
        (_, Value::Array(_) | Value::Object(_)) => Err(AppError::BadRequest(format!(
            "column {} takes a scalar value",
            col.name
        ))),
        (ColumnKind::Integer, Value::Number(n)) => n
            .as_i64()
            .filter(|i| i32::try_from(*i).is_ok())
            .map(|i| Value::Number(i.into()))
            .ok_or_else(|| AppError::BadRequest(format!("value {} out of range for column {}", n, col.name))),
        (ColumnKind::Integer, Value::String(s)) => s
            .trim()
            .parse::<i32>()
            .map(|i| Value::Number(i.into()))
            .map_err(|_| AppError::BadRequest(format!("invalid input syntax for type integer: \"{}\"", s))),
        (ColumnKind::Integer, Value::Bool(_)) => Err(AppError::BadRequest(format!(
            "column {} takes an integer",
            col.name
        ))),
        (ColumnKind::Text, Value::String(s)) => check_text(col, s.clone()),
        (ColumnKind::Text, Value::Number(_) | Value::Bool(_)) => check_text(col, v.to_string()),
    }
}

fn check_text(col: &ColumnInfo, s: String) -> Result<Value, AppError> {
    if let Some(max) = col.max_length {
        if s.chars().count() > max as usize {
            return Err(AppError::BadRequest(format!(
                "value too long for type character varying({})",
                max
            )));
        }
    }
    if let Some(allowed) = &col.allowed {
        if !allowed.iter().any(|a| *a == s) {
            return Err(AppError::BadRequest(format!(
                "invalid input value for enum {}: \"{}\"",
                col.pg_type, s
            )));
        }
    }
    Ok(Value::String(s))
}

/// Coerce every known column in `row`; keys that are not columns are dropped.
pub fn coerce_row(table: &ResolvedTable, row: &Row) -> Result<Row, AppError> {
    row.iter()
        .filter_map(|(name, v)| table.column(name).map(|c| (c, v)))
        .map(|(c, v)| coerce(c, v).map(|v| (c.name.clone(), v)))
        .collect()
}

/// Coerce filter values; filters on unknown columns are dropped.
pub fn coerce_filters(table: &ResolvedTable, filters: &[(String, Value)]) -> Result<Vec<(String, Value)>, AppError> {
    filters
        .iter()
        .filter_map(|(name, v)| table.column(name).map(|c| (c, v)))
        .map(|(c, v)| coerce(c, v).map(|v| (c.name.clone(), v)))
        .collect()
}

/// Coerce `IN (...)` values for one column.
pub fn coerce_values(table: &ResolvedTable, column: &str, values: &[Value]) -> Result<Vec<Value>, AppError> {
    match table.column(column) {
        Some(col) => values.iter().map(|v| coerce(col, v)).collect(),
        None => Ok(Vec::new()),
    }
}
