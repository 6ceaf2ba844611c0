///
/// Named placeholder compilation.
///
/// A placeholder is a colon followed by one or more word characters
/// (`[A-Za-z0-9_]`) where the colon is not itself preceded by a colon. Each
/// one becomes a positional `?` in the template and its name is recorded in
/// order of appearance. Names are not deduplicated: `:id` used twice yields two
/// slots, both bound from `id`.
///
/// Escaping: `::name` is never a placeholder and is copied through unchanged,
/// which keeps casts such as `created_at::date` intact. There is no un-escape
/// step, so a literal `:name` in the statement must be written `::name` and
/// reaches the driver as `::name`.
///
/// Scanning is purely textual. A colon-word inside a string literal
/// (`'12:30'`) is still a placeholder.
///

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    pub template: String,
    pub parameters: Vec<String>,
}

impl PreparedQuery {
    pub fn marker_count(&self) -> usize {
        self.template.matches('?').count()
    }
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn compile(sql: &str) -> PreparedQuery {
    let mut template = String::with_capacity(sql.len());
    let mut parameters = Vec::new();
    let mut prev: Option<char> = None;
    let mut chars = sql.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let starts_placeholder = c == ':'
            && prev != Some(':')
            && chars.peek().is_some_and(|&(_, next)| is_word(next));

        if !starts_placeholder {
            template.push(c);
            prev = Some(c);
            continue;
        }

        let name_start = start + 1;
        let mut name_end = name_start;
        while let Some(&(i, next)) = chars.peek() {
            if !is_word(next) {
                break;
            }
            name_end = i + next.len_utf8();
            prev = Some(next);
            chars.next();
        }
        parameters.push(sql[name_start..name_end].to_string());
        template.push('?');
    }

    PreparedQuery {
        template,
        parameters,
    }
}
