//! Procedure execution.
//!
//! A `ScriptHost` runs a `VerificationScript` on an execution context.
//! `ProcedureRunner` is the built-in host: it runs selects through a
//! `QuerySource`, stores results in the context's scope and evaluates each
//! assertion. `verify` wraps a run as a nested unit of work on a fork of the
//! caller's context and copies soft failures back to the caller.

use quarry_std_core::{AssertionFailure, ExecutionContext, QuarryError, QuarryResult, Row, Scope, Value};
use tracing::{debug, warn};

use crate::assertions::{check_equals, check_not_null, check_null};
use crate::generator::{GeneratedVerification, EXPECTED_VAR};
use crate::script::{Check, Operand, ScriptStatement, Severity, VerificationScript};

/// Runs the select statements of a procedure
pub trait QuerySource {
    fn run_select(&self, ctx: &ExecutionContext, sql: &str) -> QuarryResult<Vec<Row>>;
}

pub trait ScriptHost {
    fn run(&self, ctx: &mut ExecutionContext, script: &VerificationScript) -> QuarryResult<VerificationReport>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationReport {
    pub checks: usize,
    pub failures: Vec<AssertionFailure>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ProcedureRunner<'a> {
    source: &'a dyn QuerySource,
}

impl<'a> ProcedureRunner<'a> {
    pub fn new(source: &'a dyn QuerySource) -> Self {
        Self { source }
    }
}

impl ScriptHost for ProcedureRunner<'_> {
    fn run(&self, ctx: &mut ExecutionContext, script: &VerificationScript) -> QuarryResult<VerificationReport> {
        let mut report = VerificationReport::default();

        for statement in &script.statements {
            match statement {
                ScriptStatement::RunSelect { target, sql } => {
                    let rows = self.source.run_select(ctx, sql)?;
                    ctx.scope.set(target.as_str(), Value::List(rows.into_iter().map(Value::List).collect()));
                }
                ScriptStatement::Assert(assertion) => {
                    report.checks += 1;
                    let (group, label) = (assertion.group.as_str(), assertion.label.as_str());
                    let outcome = match &assertion.check {
                        Check::Null(actual) => check_null(group, label, &evaluate(&ctx.scope, actual)),
                        Check::NotNull(actual) => check_not_null(group, label, &evaluate(&ctx.scope, actual)),
                        Check::Equals { expected, actual } => check_equals(
                            group,
                            label,
                            &evaluate(&ctx.scope, expected),
                            &evaluate(&ctx.scope, actual),
                        ),
                    };
                    let Err(failure) = outcome else {
                        continue;
                    };
                    if script.severity == Severity::Fatal {
                        return Err(QuarryError::Assertion(failure));
                    }
                    warn!(script = %ctx.script(), %failure, "verification check failed");
                    ctx.record_failure(failure.clone());
                    report.failures.push(failure);
                }
            }
        }
        Ok(report)
    }
}

/// Value of an operand; unset variables and missing indices are null
fn evaluate(scope: &Scope, operand: &Operand) -> Value {
    match operand {
        Operand::Var(name) => scope.get(name).cloned().unwrap_or_default(),
        Operand::Index(target, index) => evaluate(scope, target).index(*index).cloned().unwrap_or_default(),
        Operand::Size(target) => Value::Int(evaluate(scope, target).size() as i64),
        Operand::Literal(value) => value.clone(),
    }
}

/// Run a generated procedure as a nested unit of work. Blocks until done.
pub fn verify(
    host: &dyn ScriptHost,
    ctx: &mut ExecutionContext,
    generated: &GeneratedVerification,
) -> QuarryResult<VerificationReport> {
    debug!(
        script = %ctx.script(),
        procedure = %generated.script.render(),
        "generated verification procedure"
    );
    let mut fork = ctx.fork(Scope::new().with(EXPECTED_VAR, generated.expected_value()));
    let report = host.run(&mut fork, &generated.script)?;
    for failure in fork.take_failures() {
        ctx.record_failure(failure);
    }
    Ok(report)
}
