///
/// Parameter binding.
///
/// Each compiled parameter name is looked up in the caller's scope and bound to
/// its 1-based slot:
/// - absent or null: SQL NULL
/// - timestamp: UTC text `YYYY-MM-DD HH:MM:SS.mmm` built from the epoch
///   milliseconds. The original offset is not kept; the instant is.
/// - bool: integer 0/1
/// - int, float, text, bytes: passed through to the driver as-is
/// - list, map: the driver has no representation, binding fails
///

use chrono::{DateTime, FixedOffset, Utc};
use quarry_std_core::{QuarryError, QuarryResult, Scope, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::Statement;

/// Text layout used for bound timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingParameterPolicy {
    /// A name missing from the scope binds NULL
    #[default]
    BindNull,
    /// A name missing from the scope is a binding error
    Reject,
}

pub fn bind(
    stmt: &mut Statement<'_>,
    parameters: &[String],
    scope: &Scope,
    policy: MissingParameterPolicy,
) -> QuarryResult<()> {
    for (i, name) in parameters.iter().enumerate() {
        let value = match scope.get(name) {
            Some(value) => to_sql_value(name, value)?,
            None if policy == MissingParameterPolicy::Reject => {
                return Err(QuarryError::Binding {
                    parameter: name.clone(),
                    reason: "no such variable in scope".to_string(),
                });
            }
            None => SqlValue::Null,
        };
        stmt.raw_bind_parameter(i + 1, value)
            .map_err(|e| QuarryError::Binding {
                parameter: name.clone(),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

pub fn to_sql_value(name: &str, value: &Value) -> QuarryResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(x) => SqlValue::Real(*x),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Timestamp(dt) => SqlValue::Text(timestamp_text(dt)),
        Value::List(_) | Value::Map(_) => {
            return Err(QuarryError::Binding {
                parameter: name.to_string(),
                reason: format!("{} values cannot be bound to a statement", value.type_name()),
            });
        }
    })
}

fn timestamp_text(dt: &DateTime<FixedOffset>) -> String {
    let utc = DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
        .unwrap_or_else(|| dt.with_timezone(&Utc));
    utc.format(TIMESTAMP_FORMAT).to_string()
}
