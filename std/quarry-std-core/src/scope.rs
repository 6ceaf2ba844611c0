//!
//! Variable Scope and Execution Context
//!
//! `Scope` is the host pipeline: an insertion-ordered map of variable names to
//! values that placeholders and templates resolve against.
//!
//! `ExecutionContext` carries everything a call needs explicitly rather than
//! through ambient globals: the active environment name, the identity of the
//! running script, its scope, and the soft assertion failures collected so far.
//!

use std::sync::Arc;

use indexmap::IndexMap;

use crate::exception::AssertionFailure;
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    vars: IndexMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut scope = Scope::new();
        for (k, v) in iter {
            scope.set(k, v);
        }
        scope
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    environment: String,
    script: Arc<str>,
    pub scope: Scope,
    failures: Vec<AssertionFailure>,
}

impl ExecutionContext {
    pub fn new(environment: impl Into<String>, script: impl Into<Arc<str>>) -> Self {
        Self {
            environment: environment.into(),
            script: script.into(),
            scope: Scope::new(),
            failures: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Nested unit of work: same environment and script identity, a copy of the
    /// caller's scope extended with `seed`. Nothing written in the fork is
    /// visible to the parent.
    pub fn fork(&self, seed: Scope) -> ExecutionContext {
        let mut scope = self.scope.clone();
        for (name, value) in seed.vars {
            scope.vars.insert(name, value);
        }
        ExecutionContext {
            environment: self.environment.clone(),
            script: Arc::clone(&self.script),
            scope,
            failures: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, failure: AssertionFailure) {
        self.failures.push(failure);
    }

    pub fn failures(&self) -> &[AssertionFailure] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<AssertionFailure> {
        std::mem::take(&mut self.failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_set_get() {
        let mut scope = Scope::new();
        scope.set("id", 5);
        scope.set("name", "Bob");
        scope.set("deleted", Value::Null);

        assert_eq!(scope.get("id"), Some(&Value::Int(5)));
        assert_eq!(scope.get("name"), Some(&Value::from("Bob")));
        assert!(scope.contains("deleted"));
        assert_eq!(scope.get("missing"), None);
        assert_eq!(scope.len(), 3);
    }

    #[test]
    fn test_fork_is_isolated() {
        let ctx = ExecutionContext::new("dev", "orders")
            .with_scope(Scope::new().with("id", 5));

        let mut forked = ctx.fork(Scope::new().with("expected", vec![Value::Int(1)]));
        assert_eq!(forked.environment(), "dev");
        assert_eq!(forked.script(), "orders");
        assert_eq!(forked.scope.get("id"), Some(&Value::Int(5)));
        assert!(forked.scope.contains("expected"));

        forked.scope.set("actual", 1);
        assert!(!ctx.scope.contains("actual"));
        assert!(!ctx.scope.contains("expected"));
    }

    #[test]
    fn test_failures_are_collected() {
        let mut ctx = ExecutionContext::new("dev", "main");
        ctx.record_failure(AssertionFailure::new("group", "label", "detail"));
        assert_eq!(ctx.failures().len(), 1);
        assert_eq!(ctx.take_failures().len(), 1);
        assert!(ctx.failures().is_empty());
    }
}
