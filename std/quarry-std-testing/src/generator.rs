///
/// Verification script generation.
///
/// Expected data is a sequence of rows. A row is a list of cells, a map (its
/// values in insertion order) or a single scalar (a one-column row). A null
/// cell asserts null, the wildcard `*` asserts not-null, anything else asserts
/// loose equality with the matching `expected[r][c]`. Expected values are
/// never inlined: the runner exposes them through the `expected` variable.
///

use quarry_std_core::{Row, Value};

use crate::script::{Check, Operand, Severity, VerificationScript};

/// Variable holding the query result inside the procedure
pub const RESULT_VAR: &str = "actual";
/// Variable holding the normalized expected rows inside the procedure
pub const EXPECTED_VAR: &str = "expected";

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedVerification {
    pub script: VerificationScript,
    /// `None` when the whole result is expected to be null
    pub expected: Option<Vec<Row>>,
}

impl GeneratedVerification {
    /// Value bound to `expected` in the forked scope
    pub fn expected_value(&self) -> Value {
        match &self.expected {
            Some(rows) => Value::List(rows.iter().cloned().map(Value::List).collect()),
            None => Value::Null,
        }
    }
}

pub fn normalize_expected(expected: &[Value]) -> Vec<Row> {
    expected
        .iter()
        .map(|row| match row {
            Value::List(cells) => cells.clone(),
            Value::Map(entries) => entries.values().cloned().collect(),
            scalar => vec![scalar.clone()],
        })
        .collect()
}

/// Labels come from `sql` as written; use `generate_with_labels` when the
/// text is templated before it runs.
pub fn generate(
    severity: Severity,
    description: &str,
    sql: &str,
    expected: Option<&[Value]>,
) -> GeneratedVerification {
    generate_with_labels(severity, description, sql, &column_labels(sql), expected)
}

/// `fields` names the result columns in the per-cell labels
pub fn generate_with_labels(
    severity: Severity,
    description: &str,
    sql: &str,
    fields: &[String],
    expected: Option<&[Value]>,
) -> GeneratedVerification {
    let mut script = VerificationScript::new(severity);
    script.run_select(RESULT_VAR, sql);
    let actual = || Operand::var(RESULT_VAR);

    let Some(expected) = expected else {
        script.assert(description, "Result must be null", Check::Null(actual()));
        return GeneratedVerification {
            script,
            expected: None,
        };
    };

    let rows = normalize_expected(expected);
    script.assert(description, "Result must not be null", Check::NotNull(actual()));
    script.assert(
        description,
        "Result size check",
        Check::Equals {
            expected: Operand::Literal(Value::Int(rows.len() as i64)),
            actual: actual().size(),
        },
    );

    for (r, row) in rows.iter().enumerate() {
        let group = format!("{} row {}", description, r);
        script.assert(
            &group,
            "Size check",
            Check::Equals {
                expected: Operand::Literal(Value::Int(row.len() as i64)),
                actual: actual().at(r).size(),
            },
        );
        for (c, cell) in row.iter().enumerate() {
            let label = match fields.get(c) {
                Some(field) => format!("Column {} {}", c, field),
                None => format!("Column {}", c),
            };
            let cell_actual = actual().at(r).at(c);
            let check = if cell.is_null() {
                Check::Null(cell_actual)
            } else if cell.is_wildcard() {
                Check::NotNull(cell_actual)
            } else {
                Check::Equals {
                    expected: Operand::var(EXPECTED_VAR).at(r).at(c),
                    actual: cell_actual,
                }
            };
            script.assert(&group, label, check);
        }
    }

    GeneratedVerification {
        script,
        expected: Some(rows),
    }
}

/// Names of the `select ... from` fields, with `as` aliases applied. `sql`
/// is read as given, so `${...}` templates should be expanded first.
///
/// Empty when the statement is not a select with a `from`, or when the list
/// has a `*` projection, since positions no longer line up with names.
pub fn column_labels(sql: &str) -> Vec<String> {
    let sql = sql.trim();
    let lower = sql.to_ascii_lowercase();
    let keyword = "select";
    if !lower.starts_with(keyword) || !is_boundary(lower.as_bytes(), 0, keyword.len()) {
        return Vec::new();
    }
    let Some(from) = find_top_level(&lower, "from", keyword.len()) else {
        return Vec::new();
    };

    let mut list = &sql[keyword.len()..from];
    let list_lower = list.trim_start().to_ascii_lowercase();
    for modifier in ["distinct", "all"] {
        if list_lower.starts_with(modifier) && is_boundary(list_lower.as_bytes(), 0, modifier.len()) {
            list = &list.trim_start()[modifier.len()..];
            break;
        }
    }

    let fields = split_top_level(list);
    if fields.iter().any(|field| {
        let field = field.trim();
        field == "*" || field.ends_with(".*")
    }) {
        return Vec::new();
    }
    fields.into_iter().map(field_label).collect()
}

fn field_label(field: &str) -> String {
    let lower = field.to_ascii_lowercase();
    let mut alias_at = None;
    let mut from = 0;
    while let Some(at) = find_top_level(&lower, "as", from) {
        alias_at = Some(at);
        from = at + 2;
    }
    let text = match alias_at {
        Some(at) => &field[at + 2..],
        None => field,
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_boundary(bytes: &[u8], at: usize, len: usize) -> bool {
    (at == 0 || !is_word_byte(bytes[at - 1])) && bytes.get(at + len).is_none_or(|b| !is_word_byte(*b))
}

/// Offset of `keyword` outside parentheses and quotes, at or after `start`
fn find_top_level(lower: &str, keyword: &str, start: usize) -> Option<usize> {
    let bytes = lower.as_bytes();
    let mut depth = 0usize;
    let mut quoted = false;
    for i in start..bytes.len() {
        match bytes[i] {
            b'\'' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => depth = depth.saturating_sub(1),
            _ if !quoted
                && depth == 0
                && bytes[i..].starts_with(keyword.as_bytes())
                && is_boundary(bytes, i, keyword.len()) =>
            {
                return Some(i);
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(list: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, b) in list.bytes().enumerate() {
        match b {
            b'\'' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => depth = depth.saturating_sub(1),
            b',' if !quoted && depth == 0 => {
                fields.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(&list[start..]);
    fields
}
