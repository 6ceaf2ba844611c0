///
/// Verification scripts.
///
/// A script is a list of statements: query runs that assign a variable, and
/// assertions over operands. It stays structured while it is built and run;
/// `render()` serializes it to host syntax for logs and external hosts:
///
/// ```text
/// actual = database.runSelect('select count(*) from users')
/// @group = basic check
/// checkNotNull('Result must not be null', actual)
/// ```
///

use std::fmt;

use quarry_std_core::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    /// Record the failure and continue
    #[default]
    Soft,
    /// Abort on the first failure
    Fatal,
}

impl Severity {
    fn function_prefix(self) -> &'static str {
        match self {
            Severity::Soft => "check",
            Severity::Fatal => "require",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Var(String),
    Index(Box<Operand>, usize),
    Size(Box<Operand>),
    Literal(Value),
}

impl Operand {
    pub fn var(name: &str) -> Self {
        Operand::Var(name.to_string())
    }

    pub fn at(self, index: usize) -> Self {
        Operand::Index(Box::new(self), index)
    }

    pub fn size(self) -> Self {
        Operand::Size(Box::new(self))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(name) => write!(f, "{}", name),
            Operand::Index(target, index) => write!(f, "{}[{}]", target, index),
            Operand::Size(target) => write!(f, "size({})", target),
            Operand::Literal(value) => write_literal(f, value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    Null(Operand),
    NotNull(Operand),
    Equals { expected: Operand, actual: Operand },
}

impl Check {
    fn function_suffix(&self) -> &'static str {
        match self {
            Check::Null(_) => "Null",
            Check::NotNull(_) => "NotNull",
            Check::Equals { .. } => "Equals",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    pub group: String,
    pub label: String,
    pub check: Check,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStatement {
    /// `target = database.runSelect(sql)`
    RunSelect { target: String, sql: String },
    Assert(Assertion),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationScript {
    pub severity: Severity,
    pub statements: Vec<ScriptStatement>,
}

impl VerificationScript {
    pub fn new(severity: Severity) -> Self {
        Self {
            severity,
            statements: Vec::new(),
        }
    }

    pub fn run_select(&mut self, target: &str, sql: &str) {
        self.statements.push(ScriptStatement::RunSelect {
            target: target.to_string(),
            sql: sql.to_string(),
        });
    }

    pub fn assert(&mut self, group: &str, label: impl Into<String>, check: Check) {
        self.statements.push(ScriptStatement::Assert(Assertion {
            group: group.to_string(),
            label: label.into(),
            check,
        }));
    }

    pub fn assertions(&self) -> impl Iterator<Item = &Assertion> {
        self.statements.iter().filter_map(|statement| match statement {
            ScriptStatement::Assert(assertion) => Some(assertion),
            ScriptStatement::RunSelect { .. } => None,
        })
    }

    /// Host syntax, one statement per line
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.statements.len() * 2);
        for statement in &self.statements {
            match statement {
                ScriptStatement::RunSelect { target, sql } => {
                    lines.push(format!("{} = database.runSelect({})", target, quote(sql)));
                }
                ScriptStatement::Assert(assertion) => {
                    lines.push(format!("@group = {}", assertion.group));
                    let function = format!(
                        "{}{}",
                        self.severity.function_prefix(),
                        assertion.check.function_suffix()
                    );
                    let operands = match &assertion.check {
                        Check::Null(actual) | Check::NotNull(actual) => actual.to_string(),
                        Check::Equals { expected, actual } => format!("{}, {}", expected, actual),
                    };
                    lines.push(format!("{}({}, {})", function, quote(&assertion.label), operands));
                }
            }
        }
        lines.join("\n")
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => write!(f, "{}", value),
        Value::List(items) => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_literal(f, item)?;
            }
            write!(f, "]")
        }
        Value::Map(entries) => {
            write!(f, "{{")?;
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: ", quote(key))?;
                write_literal(f, item)?;
            }
            write!(f, "}}")
        }
        other => write!(f, "{}", quote(&other.to_string())),
    }
}
