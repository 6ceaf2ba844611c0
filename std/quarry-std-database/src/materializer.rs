///
/// Result materialization.
///
/// Reads the statement's column count and declared column types once, then
/// every cursor row by position. The whole result is realized in memory.
///
/// Native mapping: NULL -> null, INTEGER -> int, REAL -> float, TEXT -> string,
/// BLOB -> bytes. Columns whose declared type mentions DATE or TIME are
/// temporal: integers there are epoch milliseconds and text in the usual SQL
/// layouts becomes a UTC timestamp. Text that does not parse stays text.
///

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use quarry_std_core::{Row, Value};
use rusqlite::types::ValueRef;
use rusqlite::Statement;

const NAIVE_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Native,
    Temporal,
}

impl ColumnKind {
    pub fn from_decl_type(decl: Option<&str>) -> Self {
        match decl {
            Some(decl) => {
                let upper = decl.to_ascii_uppercase();
                if upper.contains("DATE") || upper.contains("TIME") {
                    ColumnKind::Temporal
                } else {
                    ColumnKind::Native
                }
            }
            None => ColumnKind::Native,
        }
    }
}

pub fn column_kinds(stmt: &Statement<'_>) -> Vec<ColumnKind> {
    stmt.columns()
        .iter()
        .map(|column| ColumnKind::from_decl_type(column.decl_type()))
        .collect()
}

/// Run an already bound statement and collect every row
pub fn materialize(stmt: &mut Statement<'_>) -> rusqlite::Result<Vec<Row>> {
    let kinds = column_kinds(stmt);
    let mut rows = stmt.raw_query();
    let mut result = Vec::new();

    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(kinds.len());
        for (i, kind) in kinds.iter().enumerate() {
            values.push(to_value(row.get_ref(i)?, *kind));
        }
        result.push(values);
    }
    Ok(result)
}

pub fn to_value(value: ValueRef<'_>, kind: ColumnKind) -> Value {
    match (value, kind) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(millis), ColumnKind::Temporal) => {
            Value::timestamp_millis(millis).unwrap_or(Value::Int(millis))
        }
        (ValueRef::Integer(i), ColumnKind::Native) => Value::Int(i),
        (ValueRef::Real(x), _) => Value::Float(x),
        (ValueRef::Text(bytes), kind) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match kind {
                ColumnKind::Temporal => parse_timestamp(&text)
                    .map(Value::Timestamp)
                    .unwrap_or(Value::Text(text)),
                ColumnKind::Native => Value::Text(text),
            }
        }
        (ValueRef::Blob(bytes), _) => Value::Bytes(bytes.to_vec()),
    }
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt);
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}
