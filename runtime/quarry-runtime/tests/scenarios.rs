//! End-to-end runs through the builtin table against a file-backed database.

use std::sync::Arc;

use quarry_runtime::{Database, ExecutionContext, FunctionTable, QuarryError, Scope, Value};
use quarry_std_env::EnvironmentConfig;

struct Harness {
    _dir: tempfile::TempDir,
    db: Database,
    table: FunctionTable,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            "[environment.test.database]\ndriver = \"org.sqlite.JDBC\"\njdbcUrl = \"jdbc:sqlite:{}\"\nmaxPoolSize = 2\n",
            dir.path().join("scenarios.db").display()
        );
        let db = Database::new(Arc::new(EnvironmentConfig::parse(&toml).unwrap()));
        let harness = Self {
            _dir: dir,
            db,
            table: FunctionTable::new(),
        };

        let mut ctx = harness.ctx(Scope::new());
        harness.call(
            &mut ctx,
            "database::execute",
            &["create table users(id integer primary key, name text not null, deleted_at timestamp)"],
        );
        for (id, name) in [(5, "Alice"), (6, "Carol"), (7, "Dave")] {
            let mut ctx = harness.ctx(Scope::new().with("id", id).with("name", name));
            harness.call(&mut ctx, "database::runUpdate", &["insert into users(id, name) values(:id, :name)"]);
        }
        harness
    }

    fn ctx(&self, scope: Scope) -> ExecutionContext {
        ExecutionContext::new("test", "scenarios").with_scope(scope)
    }

    fn call(&self, ctx: &mut ExecutionContext, name: &str, args: &[&str]) -> Value {
        let args: Vec<Value> = args.iter().map(|a| Value::from(*a)).collect();
        self.call_values(ctx, name, &args).unwrap()
    }

    fn call_values(&self, ctx: &mut ExecutionContext, name: &str, args: &[Value]) -> Result<Value, QuarryError> {
        self.table.call(&self.db, ctx, name, args)
    }
}

fn rows(rows: Vec<Vec<Value>>) -> Value {
    Value::List(rows.into_iter().map(Value::List).collect())
}

#[test]
fn select_binds_named_parameter_from_scope() {
    let h = Harness::new();
    let mut ctx = h.ctx(Scope::new().with("id", 5));
    let result = h.call(&mut ctx, "database::runSelect", &["select id, name from users where id = :id"]);
    assert_eq!(result, rows(vec![vec![Value::Int(5), Value::from("Alice")]]));
}

#[test]
fn insert_reports_affected_count_and_generated_key() {
    let h = Harness::new();
    let mut ctx = h.ctx(Scope::new().with("name", "Bob"));
    let result = h.call(&mut ctx, "database::runUpdate", &["insert into users(name) values(:name)"]);
    assert_eq!(result, Value::List(vec![Value::Int(1), Value::Int(8)]));

    let mut ctx = h.ctx(Scope::new().with("id", 8));
    let stored = h.call(&mut ctx, "database::runSelect", &["select name from users where id = :id"]);
    assert_eq!(stored, rows(vec![vec![Value::from("Bob")]]));
}

#[test]
fn count_check_passes_and_fails_softly() {
    let h = Harness::new();
    let mut ctx = h.ctx(Scope::new());
    let args = [Value::from("basic check"), Value::from("select count(*) from users"), Value::Int(3)];
    assert_eq!(h.call_values(&mut ctx, "database::expectEquals", &args).unwrap(), Value::Bool(true));
    assert!(ctx.failures().is_empty());

    h.call(&mut ctx, "database::execute", &["delete from users"]);
    assert_eq!(h.call_values(&mut ctx, "database::expectEquals", &args).unwrap(), Value::Bool(false));

    let failures = ctx.failures();
    assert!(!failures.is_empty());
    assert!(failures.iter().all(|f| f.group.starts_with("basic check")));
    assert!(failures.iter().any(|f| f.label.contains("0 count(*)")));
}

#[test]
fn null_cell_check_uses_caller_scope() {
    let h = Harness::new();
    let args = [
        Value::from("nullable check"),
        Value::from("select deleted_at from users where id=:id"),
        Value::Null,
    ];

    let mut ctx = h.ctx(Scope::new().with("id", 5));
    assert_eq!(h.call_values(&mut ctx, "database::expectEquals", &args).unwrap(), Value::Bool(true));

    // Written through a parameter: a literal '00:00:00' would scan as placeholders.
    ctx.scope.set("at", "2024-01-01 00:00:00");
    h.call(&mut ctx, "database::runUpdate", &["update users set deleted_at = :at where id = :id"]);
    assert_eq!(h.call_values(&mut ctx, "database::expectEquals", &args).unwrap(), Value::Bool(false));
    let failure = &ctx.failures()[0];
    assert_eq!(failure.group, "nullable check row 0");
    assert_eq!(failure.label, "Column 0 deleted_at");
    assert!(matches!(failure.actual, Some(Value::Timestamp(_))));
}

#[test]
fn update_keyword_is_case_insensitive() {
    let h = Harness::new();
    let mut ctx = h.ctx(Scope::new().with("name", "Eve"));
    for sql in [
        "UPDATE users set name = :name where id = 5",
        "Update users set name = :name where id = 6",
        "\n  update users\n  set name = :name\n  where id = 7",
    ] {
        let result = h.call(&mut ctx, "database::execute", &[sql]);
        assert_eq!(result, rows(vec![vec![Value::Int(1)]]));
    }
    let names = h.call(&mut ctx, "database::runSelect", &["select distinct name from users"]);
    assert_eq!(names, rows(vec![vec![Value::from("Eve")]]));
}

#[test]
fn fatal_expectation_aborts_with_assertion_error() {
    let h = Harness::new();
    let mut ctx = h.ctx(Scope::new());
    let args = [
        Value::from("strict"),
        Value::from("select id, name from users order by id"),
        Value::List(vec![Value::Int(5), Value::from("Alice")]),
        Value::List(vec![Value::Int(6), Value::wildcard()]),
    ];
    match h.call_values(&mut ctx, "database::expectEqualsFatal", &args) {
        Err(QuarryError::Assertion(failure)) => {
            assert_eq!(failure.group, "strict");
            assert_eq!(failure.label, "Result size check");
            assert_eq!(failure.detail, "expected 2, got 3");
        }
        other => panic!("Expected assertion error, got {:?}", other),
    }
    assert!(ctx.failures().is_empty());
}

#[test]
fn keyed_rows_compare_by_insertion_order() {
    let h = Harness::new();
    let mut ctx = h.ctx(Scope::new());
    let row = Value::Map(
        [("id", Value::Int(6)), ("name", Value::from("Carol"))]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    );
    let args = [Value::from("keyed"), Value::from("select id, name from users where id = 6"), row];
    assert_eq!(h.call_values(&mut ctx, "database::expectEqualsFatal", &args).unwrap(), Value::Bool(true));
}

#[test]
fn named_datasource_registration_is_idempotent() {
    let h = Harness::new();
    let mut ctx = h.ctx(Scope::new());
    h.call(&mut ctx, "database::registerDatasource", &["scratch", "sqlite", "sqlite::memory:"]);
    h.call(&mut ctx, "database::registerDatasource", &["scratch", "sqlite", "sqlite:/should/not/be/opened.db"]);

    let args = [Value::from("create table s(x)"), Value::from("scratch")];
    h.call_values(&mut ctx, "database::execute", &args).unwrap();
    let args = [Value::from("select count(*) from s"), Value::from("scratch")];
    assert_eq!(
        h.call_values(&mut ctx, "database::runSelect", &args).unwrap(),
        rows(vec![vec![Value::Int(0)]])
    );

    let missing = [Value::from("select 1"), Value::from("reporting")];
    assert!(matches!(
        h.call_values(&mut ctx, "database::runSelect", &missing),
        Err(QuarryError::Configuration { .. })
    ));
}

#[test]
fn failed_statements_release_their_connection() {
    let h = Harness::new();
    let mut ctx = h.ctx(Scope::new());
    for _ in 0..5 {
        let args = [Value::from("insert into users(name) values(null)")];
        assert!(matches!(
            h.call_values(&mut ctx, "database::runUpdate", &args),
            Err(QuarryError::Execution { .. })
        ));
    }
    let source = h.db.executor().registry().get_source("test", None).unwrap();
    assert_eq!(source.idle_count(), source.open_count());
    assert!(source.open_count() <= 2);
}
