///
/// Builtin function registry.
///
/// Every operation a quarry program can call is listed here with its
/// parameters and handler. There is no discovery at runtime: a function the
/// host can reach is a function in this table.
///
/// Arguments are validated before a handler runs: arity against the required,
/// optional and variadic parameters, and `Text` parameters must be strings
/// (or null when optional). Violations are `QuarryError::Function`.
///

use indexmap::IndexMap;
use quarry_std_core::{ExecutionContext, QuarryError, QuarryResult, Row, Value};

use crate::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Any,
}

#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub optional: bool,
}

const fn text(name: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::Text,
        optional: false,
    }
}

const fn optional_text(name: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::Text,
        optional: true,
    }
}

pub type Handler = fn(&Database, &mut ExecutionContext, &[Value]) -> QuarryResult<Value>;

pub struct BuiltinFunction {
    pub name: &'static str,
    pub params: &'static [Param],
    /// Name of the trailing variadic parameter, if any
    pub variadic: Option<&'static str>,
    pub handler: Handler,
}

impl BuiltinFunction {
    fn required(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }

    fn validate(&self, args: &[Value]) -> QuarryResult<()> {
        let required = self.required();
        if args.len() < required {
            return Err(self.error(format!(
                "expected at least {} argument(s), got {}",
                required,
                args.len()
            )));
        }
        if self.variadic.is_none() && args.len() > self.params.len() {
            return Err(self.error(format!(
                "expected at most {} argument(s), got {}",
                self.params.len(),
                args.len()
            )));
        }
        for (param, arg) in self.params.iter().zip(args) {
            let accepted = match param.kind {
                ParamKind::Any => true,
                ParamKind::Text => matches!(arg, Value::Text(_)) || (param.optional && arg.is_null()),
            };
            if !accepted {
                return Err(self.error(format!(
                    "argument '{}' must be a string, got {}",
                    param.name,
                    arg.type_name()
                )));
            }
        }
        Ok(())
    }

    fn error(&self, reason: String) -> QuarryError {
        QuarryError::Function {
            name: self.name.to_string(),
            reason,
        }
    }
}

impl std::fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("variadic", &self.variadic)
            .finish_non_exhaustive()
    }
}

/// Get the built-in function registry
/// Add new built-in functions here
pub fn get_builtin_registry() -> &'static [BuiltinFunction] {
    static REGISTRY: &[BuiltinFunction] = &[
        // ========================================
        // Database module - statements
        // ========================================
        BuiltinFunction {
            name: "database::execute",
            params: &[text("sql"), optional_text("datasource")],
            variadic: None,
            handler: call_execute,
        },
        BuiltinFunction {
            name: "database::runUpdate",
            params: &[text("sql"), optional_text("datasource")],
            variadic: None,
            handler: call_run_update,
        },
        BuiltinFunction {
            name: "database::runSelect",
            params: &[text("sql"), optional_text("datasource")],
            variadic: None,
            handler: call_run_select,
        },
        BuiltinFunction {
            name: "database::registerDatasource",
            params: &[
                text("name"),
                text("driver"),
                text("jdbcUrl"),
                optional_text("username"),
                optional_text("password"),
            ],
            variadic: None,
            handler: call_register_datasource,
        },
        // ========================================
        // Database module - verification
        // ========================================
        BuiltinFunction {
            name: "database::expectEquals",
            params: &[text("description"), text("sql")],
            variadic: Some("expected"),
            handler: call_expect_equals,
        },
        BuiltinFunction {
            name: "database::expectEqualsFatal",
            params: &[text("description"), text("sql")],
            variadic: Some("expected"),
            handler: call_expect_equals_fatal,
        },
    ];
    REGISTRY
}

/// Builtins indexed by name
pub struct FunctionTable {
    functions: IndexMap<&'static str, &'static BuiltinFunction>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self {
            functions: get_builtin_registry().iter().map(|f| (f.name, f)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static BuiltinFunction> {
        self.functions.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    pub fn call(
        &self,
        db: &Database,
        ctx: &mut ExecutionContext,
        name: &str,
        args: &[Value],
    ) -> QuarryResult<Value> {
        let function = self.get(name).ok_or_else(|| QuarryError::Function {
            name: name.to_string(),
            reason: "unknown function".to_string(),
        })?;
        function.validate(args)?;
        (function.handler)(db, ctx, args)
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::new()
    }
}

fn arg_str(args: &[Value], index: usize) -> Option<&str> {
    args.get(index).and_then(Value::as_str)
}

/// Validated arguments guarantee required text parameters are present.
fn required_str(args: &[Value], index: usize) -> &str {
    arg_str(args, index).unwrap_or_default()
}

fn rows_value(rows: Vec<Row>) -> Value {
    Value::List(rows.into_iter().map(Value::List).collect())
}

fn call_execute(db: &Database, ctx: &mut ExecutionContext, args: &[Value]) -> QuarryResult<Value> {
    db.execute(ctx, required_str(args, 0), arg_str(args, 1)).map(rows_value)
}

fn call_run_update(db: &Database, ctx: &mut ExecutionContext, args: &[Value]) -> QuarryResult<Value> {
    db.run_update(ctx, required_str(args, 0), arg_str(args, 1)).map(Value::List)
}

fn call_run_select(db: &Database, ctx: &mut ExecutionContext, args: &[Value]) -> QuarryResult<Value> {
    db.run_select(ctx, required_str(args, 0), arg_str(args, 1)).map(rows_value)
}

fn call_register_datasource(db: &Database, ctx: &mut ExecutionContext, args: &[Value]) -> QuarryResult<Value> {
    db.register_datasource(
        ctx,
        required_str(args, 0),
        required_str(args, 1),
        required_str(args, 2),
        arg_str(args, 3),
        arg_str(args, 4),
    )?;
    Ok(Value::Null)
}

fn call_expect_equals(db: &Database, ctx: &mut ExecutionContext, args: &[Value]) -> QuarryResult<Value> {
    db.expect_equals(ctx, required_str(args, 0), required_str(args, 1), Some(&args[2..]))
        .map(Value::Bool)
}

fn call_expect_equals_fatal(db: &Database, ctx: &mut ExecutionContext, args: &[Value]) -> QuarryResult<Value> {
    db.expect_equals_fatal(ctx, required_str(args, 0), required_str(args, 1), Some(&args[2..]))
        .map(Value::Bool)
}
