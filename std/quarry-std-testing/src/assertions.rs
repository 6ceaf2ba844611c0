///
/// Assertion primitives.
///
/// Each check returns the failure instead of aborting so the caller decides
/// between recording it (soft) and propagating it (fatal). Failures keep the
/// compared values for reporting.
///

use quarry_std_core::{AssertionFailure, Value};

fn describe(value: &Value) -> String {
    match value {
        Value::Text(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

pub fn check_null(group: &str, label: &str, actual: &Value) -> Result<(), AssertionFailure> {
    if actual.is_null() {
        return Ok(());
    }
    Err(AssertionFailure::new(group, label, format!("expected null, got {}", describe(actual)))
        .with_values(Some(Value::Null), Some(actual.clone())))
}

pub fn check_not_null(group: &str, label: &str, actual: &Value) -> Result<(), AssertionFailure> {
    if !actual.is_null() {
        return Ok(());
    }
    Err(AssertionFailure::new(group, label, "expected a value, got null").with_values(None, Some(Value::Null)))
}

pub fn check_equals(
    group: &str,
    label: &str,
    expected: &Value,
    actual: &Value,
) -> Result<(), AssertionFailure> {
    if expected.loosely_equals(actual) {
        return Ok(());
    }
    Err(AssertionFailure::new(
        group,
        label,
        format!("expected {}, got {}", describe(expected), describe(actual)),
    )
    .with_values(Some(expected.clone()), Some(actual.clone())))
}
