//!
//! Error Types
//!
//! All failures surfaced to the host interpreter. None of them is retried
//! internally; transient failures are the caller's responsibility.
//!
//! Error categories:
//! - Configuration: missing or invalid datasource configuration at first use
//! - Connection: pool exhausted or driver connect failure
//! - Binding: a parameter value the driver rejects, or a missing parameter
//! - Execution: driver-level statement failure, reported verbatim
//! - Assertion: a fail-fast verification check did not hold
//! - Function: unknown builtin or invalid call arguments
//! - Template: SQL text templating failure
//!

use std::fmt;

use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Error)]
pub enum QuarryError {
    #[error("configuration error for '{key}': {reason}")]
    Configuration { key: String, reason: String },

    #[error("connection error on datasource '{datasource}': {reason}")]
    Connection { datasource: String, reason: String },

    #[error("cannot bind parameter ':{parameter}': {reason}")]
    Binding { parameter: String, reason: String },

    #[error("statement failed: {reason}\n  sql: {sql}")]
    Execution { sql: String, reason: String },

    #[error("assertion failed: {0}")]
    Assertion(AssertionFailure),

    #[error("{name}: {reason}")]
    Function { name: String, reason: String },

    #[error("template error: {reason}")]
    Template { reason: String },
}

pub type QuarryResult<T> = Result<T, QuarryError>;

/// One verification check that did not hold
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionFailure {
    pub group: String,
    pub label: String,
    pub detail: String,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
}

impl AssertionFailure {
    pub fn new(group: impl Into<String>, label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            label: label.into(),
            detail: detail.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn with_values(mut self, expected: Option<Value>, actual: Option<Value>) -> Self {
        self.expected = expected;
        self.actual = actual;
        self
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.group, self.label, self.detail)
    }
}
