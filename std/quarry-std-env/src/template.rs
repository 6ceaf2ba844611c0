///
/// Text templating for SQL statements.
///
/// `${name}` is replaced by the display form of `name` in the scope. Unknown
/// names and nulls expand to the empty string. A bare `$` (as in `$1` or
/// `price$`) is left alone so driver syntax survives; only the braced form is
/// a reference.
///
/// Templating runs on the original SQL text, before placeholder scanning, so
/// an expanded value can itself contain `:name` placeholders.
///

use quarry_std_core::{QuarryError, QuarryResult, Scope, Value};

pub fn expand(text: &str, scope: &Scope) -> QuarryResult<String> {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(QuarryError::Template {
                reason: format!("unterminated '${{' at offset {}", text.len() - rest.len() + start),
            });
        };
        let name = after[..end].trim();
        match scope.get(name) {
            None | Some(Value::Null) => {}
            Some(value) => result.push_str(&value.to_string()),
        }
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}
