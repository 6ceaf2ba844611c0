///
/// quarry-std-testing - Result Verification
///
/// Turns literal expected data into a verification procedure that re-runs a
/// query and checks its result shape and values row by row, column by column.
///
/// ## Assertions
/// - `check_null(group, label, actual)` - value must be null
/// - `check_not_null(group, label, actual)` - value must be present
/// - `check_equals(group, label, expected, actual)` - loose host equality
///
/// ## Procedures
/// - `generate(severity, description, sql, expected)` - build the script
/// - `VerificationScript::render()` - host syntax, for logs and external hosts
/// - `ProcedureRunner` - built-in `ScriptHost` that evaluates the script
/// - `verify(host, ctx, generated)` - run on a fork of the caller's context
///
/// Soft procedures record every failed check and keep going. Fatal procedures
/// stop at the first failed check with `QuarryError::Assertion`.
///

pub mod assertions;
pub mod generator;
pub mod runner;
pub mod script;

pub use assertions::{check_equals, check_not_null, check_null};
pub use generator::{column_labels, generate, generate_with_labels, normalize_expected, GeneratedVerification, EXPECTED_VAR, RESULT_VAR};
pub use runner::{verify, ProcedureRunner, QuerySource, ScriptHost, VerificationReport};
pub use script::{Assertion, Check, Operand, ScriptStatement, Severity, VerificationScript};
