///
/// Statement execution.
///
/// `QueryExecutor` dispatches on the statement keyword: `select` runs the
/// query path and materializes rows, anything else runs the update path and
/// reports `[affected, key*]`. Both paths share one pipeline:
///
///   template -> acquire -> compile -> bind -> execute -> release
///
/// The connection guard is scoped to a single call, so the connection goes
/// back to its pool whether the statement succeeded or failed.
///

use std::sync::Arc;

use quarry_std_core::{ExecutionContext, QuarryError, QuarryResult, Row, Scope, Value};
use rusqlite::{Connection, Statement};
use tracing::{debug, warn};

use crate::binder::{bind, MissingParameterPolicy};
use crate::compiler::compile;
use crate::materializer::materialize;
use crate::registry::DatasourceRegistry;

/// Host-level text substitution applied to SQL before placeholder scanning
pub trait Templater: Send + Sync {
    fn render(&self, sql: &str, scope: &Scope) -> QuarryResult<String>;
}

/// Expands `${name}` from the caller's scope
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeTemplater;

impl Templater for ScopeTemplater {
    fn render(&self, sql: &str, scope: &Scope) -> QuarryResult<String> {
        quarry_std_env::expand(sql, scope)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoTemplating;

impl Templater for NoTemplating {
    fn render(&self, sql: &str, _scope: &Scope) -> QuarryResult<String> {
        Ok(sql.to_string())
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// First word of `sql`, lowercased. Leading whitespace, comments markers and
/// punctuation are skipped, so `"\n  (SELECT"` yields `select`.
pub fn statement_keyword(sql: &str) -> String {
    sql.trim_start_matches(|c: char| !is_word(c))
        .chars()
        .take_while(|c| is_word(*c))
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub affected: u64,
    pub generated_keys: Vec<i64>,
}

impl UpdateResult {
    /// `[affected, key*]`
    pub fn into_row(self) -> Row {
        std::iter::once(Value::Int(self.affected as i64))
            .chain(self.generated_keys.into_iter().map(Value::Int))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(Vec<Row>),
    Update(UpdateResult),
}

impl QueryOutcome {
    /// Both shapes as a row matrix; an update becomes a single row.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Update(update) => vec![update.into_row()],
        }
    }
}

pub struct QueryExecutor {
    registry: Arc<DatasourceRegistry>,
    templater: Arc<dyn Templater>,
    policy: MissingParameterPolicy,
}

impl QueryExecutor {
    pub fn new(registry: Arc<DatasourceRegistry>) -> Self {
        Self {
            registry,
            templater: Arc::new(ScopeTemplater),
            policy: MissingParameterPolicy::default(),
        }
    }

    pub fn with_templater(mut self, templater: Arc<dyn Templater>) -> Self {
        self.templater = templater;
        self
    }

    pub fn with_missing_parameter_policy(mut self, policy: MissingParameterPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Arc<DatasourceRegistry> {
        &self.registry
    }

    /// `sql` as it will be compiled, after templating against `scope`
    pub fn render(&self, sql: &str, scope: &Scope) -> QuarryResult<String> {
        self.templater.render(sql, scope)
    }

    pub fn execute(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        datasource: Option<&str>,
    ) -> QuarryResult<QueryOutcome> {
        if statement_keyword(sql) == "select" {
            self.run_select(ctx, sql, datasource).map(QueryOutcome::Rows)
        } else {
            self.run_update(ctx, sql, datasource).map(QueryOutcome::Update)
        }
    }

    pub fn execute_rows(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        datasource: Option<&str>,
    ) -> QuarryResult<Vec<Row>> {
        self.execute(ctx, sql, datasource).map(QueryOutcome::into_rows)
    }

    pub fn run_update(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        datasource: Option<&str>,
    ) -> QuarryResult<UpdateResult> {
        let keyword = statement_keyword(sql);
        let reports_key = matches!(keyword.as_str(), "insert" | "replace");

        self.run_statement(ctx, sql, datasource, &keyword, |conn, stmt| {
            // `changes()` survives statements that modify nothing (DDL, PRAGMA),
            // and the rowid survives upserts that resolve to an update.
            let changes_before = total_changes(conn)?;
            let rowid_before = conn.last_insert_rowid();
            stmt.raw_execute()?;
            let affected = total_changes(conn)?.saturating_sub(changes_before);
            let rowid = conn.last_insert_rowid();
            let generated_keys = if reports_key && affected > 0 && rowid != rowid_before {
                vec![rowid]
            } else {
                Vec::new()
            };
            Ok(UpdateResult {
                affected,
                generated_keys,
            })
        })
    }

    pub fn run_select(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        datasource: Option<&str>,
    ) -> QuarryResult<Vec<Row>> {
        self.run_statement(ctx, sql, datasource, "select", |_, stmt| materialize(stmt))
    }

    fn run_statement<T>(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        datasource: Option<&str>,
        keyword: &str,
        run: impl FnOnce(&Connection, &mut Statement<'_>) -> rusqlite::Result<T>,
    ) -> QuarryResult<T> {
        let rendered = self.templater.render(sql, &ctx.scope)?;
        let query = compile(&rendered);
        let source = self.registry.get_source(ctx.environment(), datasource)?;
        let conn = source.acquire()?;

        debug!(
            datasource = %source.key(),
            keyword,
            parameters = ?query.parameters,
            "executing statement"
        );

        let result = prepare_bind_run(&conn, &rendered, &query.template, &query.parameters, &ctx.scope, self.policy, run);
        if let Err(e) = &result {
            warn!(datasource = %source.key(), keyword, error = %e, "statement failed");
        }
        result
    }
}

fn prepare_bind_run<T>(
    conn: &Connection,
    sql: &str,
    template: &str,
    parameters: &[String],
    scope: &Scope,
    policy: MissingParameterPolicy,
    run: impl FnOnce(&Connection, &mut Statement<'_>) -> rusqlite::Result<T>,
) -> QuarryResult<T> {
    let mut stmt = conn.prepare(template).map_err(|e| execution_error(sql, e))?;
    bind(&mut stmt, parameters, scope, policy)?;
    run(conn, &mut stmt).map_err(|e| execution_error(sql, e))
}

/// Rows changed by every statement on this connection so far, triggers included
fn total_changes(conn: &Connection) -> rusqlite::Result<u64> {
    conn.query_row("select total_changes()", [], |row| row.get::<_, i64>(0))
        .map(|n| n.max(0) as u64)
}

fn execution_error(sql: &str, e: rusqlite::Error) -> QuarryError {
    QuarryError::Execution {
        sql: sql.to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use quarry_std_env::EnvironmentConfig;

    struct Fixture {
        _dir: tempfile::TempDir,
        executor: QueryExecutor,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let url = format!("jdbc:sqlite:{}", dir.path().join("app.db").display());
            let config = EnvironmentConfig::new()
                .with("test", "database.driver", "sqlite")
                .with("test", "database.jdbcUrl", url);
            let executor = QueryExecutor::new(Arc::new(DatasourceRegistry::new(Arc::new(config))));

            let ctx = ExecutionContext::new("test", "fixture");
            executor
                .run_update(
                    &ctx,
                    "create table users(id integer primary key, name text, deleted_at timestamp)",
                    None,
                )
                .unwrap();
            for (id, name) in [(5, "Alice"), (6, "Carol"), (7, "Dave")] {
                let ctx = ExecutionContext::new("test", "fixture")
                    .with_scope(Scope::new().with("id", id).with("name", name));
                executor
                    .run_update(&ctx, "insert into users(id, name) values(:id, :name)", None)
                    .unwrap();
            }
            Self { _dir: dir, executor }
        }

        fn ctx(&self, scope: Scope) -> ExecutionContext {
            ExecutionContext::new("test", "executor-test").with_scope(scope)
        }
    }

    #[test]
    fn test_statement_keyword() {
        assert_eq!(statement_keyword("select 1"), "select");
        assert_eq!(statement_keyword("  UPDATE users set x = 1"), "update");
        assert_eq!(statement_keyword("\n\t(Select 1)"), "select");
        assert_eq!(statement_keyword("insert\ninto t values (1)"), "insert");
        assert_eq!(statement_keyword(""), "");
    }

    #[test]
    fn test_select_binds_named_parameter() {
        let fx = Fixture::new();
        let ctx = fx.ctx(Scope::new().with("id", 5));
        let rows = fx
            .executor
            .run_select(&ctx, "select id, name from users where id = :id", None)
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Int(5), Value::from("Alice")]]);
    }

    #[test]
    fn test_insert_reports_generated_key() {
        let fx = Fixture::new();
        let ctx = fx.ctx(Scope::new().with("name", "Bob"));
        let result = fx
            .executor
            .run_update(&ctx, "insert into users(name) values(:name)", None)
            .unwrap();
        assert_eq!(result.affected, 1);
        assert_eq!(result.generated_keys, vec![8]);
        assert_eq!(result.into_row(), vec![Value::Int(1), Value::Int(8)]);
    }

    #[test]
    fn test_ddl_reports_no_affected_rows() {
        let fx = Fixture::new();
        let ctx = fx.ctx(Scope::new());
        let inserted = fx
            .executor
            .run_update(&ctx, "insert into users(name) values ('a'), ('b'), ('c')", None)
            .unwrap();
        assert_eq!(inserted.affected, 3);

        let created = fx.executor.run_update(&ctx, "create table u(x integer)", None).unwrap();
        assert_eq!(created.into_row(), vec![Value::Int(0)]);
    }

    #[test]
    fn test_upsert_conflict_reports_no_key() {
        let fx = Fixture::new();
        let ctx = fx.ctx(Scope::new());
        let sql = "insert into users(id, name) values (5, 'Zed') \
                   on conflict(id) do update set name = excluded.name";
        let result = fx.executor.run_update(&ctx, sql, None).unwrap();
        assert_eq!(result.affected, 1);
        assert!(result.generated_keys.is_empty());

        let rows = fx
            .executor
            .run_select(&ctx, "select name from users where id = 5", None)
            .unwrap();
        assert_eq!(rows, vec![vec![Value::from("Zed")]]);
    }

    #[test]
    fn test_update_keyword_any_case_routes_to_update() {
        let fx = Fixture::new();
        let ctx = fx.ctx(Scope::new().with("name", "Zed"));
        let outcome = fx
            .executor
            .execute(&ctx, "UpDaTe users set name = :name where id > 5", None)
            .unwrap();
        assert_eq!(
            outcome,
            QueryOutcome::Update(UpdateResult {
                affected: 2,
                generated_keys: Vec::new(),
            })
        );
    }

    #[test]
    fn test_execute_rows_normalizes_both_paths() {
        let fx = Fixture::new();
        let ctx = fx.ctx(Scope::new());
        let rows = fx.executor.execute_rows(&ctx, "delete from users where id = 7", None).unwrap();
        assert_eq!(rows, vec![vec![Value::Int(1)]]);

        let rows = fx
            .executor
            .execute_rows(&ctx, "\n  select count(*)\n  from users", None)
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Int(2)]]);
    }

    #[test]
    fn test_null_and_timestamp_round_trip() {
        let fx = Fixture::new();
        let at = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 9, 0, 0)
            .unwrap()
            + chrono::Duration::milliseconds(125);
        let ctx = fx.ctx(Scope::new().with("at", at).with("id", 6));
        fx.executor
            .run_update(&ctx, "update users set deleted_at = :at where id = :id", None)
            .unwrap();

        let rows = fx
            .executor
            .run_select(&ctx, "select deleted_at from users where id in (5, :id) order by id", None)
            .unwrap();
        assert_eq!(rows[0], vec![Value::Null]);
        match &rows[1][0] {
            Value::Timestamp(read) => assert_eq!(read.timestamp_millis(), at.timestamp_millis()),
            other => panic!("expected timestamp, got {:?}", other),
        }

        let ctx = fx.ctx(Scope::new().with("gone", Value::Null));
        let rows = fx.executor.run_select(&ctx, "select :gone", None).unwrap();
        assert_eq!(rows, vec![vec![Value::Null]]);
    }

    #[test]
    fn test_templating_runs_before_compilation() {
        let fx = Fixture::new();
        let ctx = fx.ctx(Scope::new().with("table", "users").with("id", 6));
        let rows = fx
            .executor
            .run_select(&ctx, "select name from ${table} where id = :id", None)
            .unwrap();
        assert_eq!(rows, vec![vec![Value::from("Carol")]]);

        let literal = QueryExecutor::new(Arc::clone(fx.executor.registry())).with_templater(Arc::new(NoTemplating));
        let err = literal
            .run_select(&ctx, "select name from ${table} where id = :id", None)
            .unwrap_err();
        assert!(matches!(err, QuarryError::Execution { .. }));
    }

    #[test]
    fn test_connection_released_after_failure() {
        let fx = Fixture::new();
        let source = fx.executor.registry().get_source("test", None).unwrap();

        let ctx = fx.ctx(Scope::new().with("ids", vec![Value::Int(1)]));
        let err = fx
            .executor
            .run_select(&ctx, "select * from nowhere", None)
            .unwrap_err();
        match err {
            QuarryError::Execution { sql, reason } => {
                assert_eq!(sql, "select * from nowhere");
                assert!(reason.contains("nowhere"));
            }
            other => panic!("Expected execution error, got {:?}", other),
        }
        let err = fx
            .executor
            .run_select(&ctx, "select * from users where id in (:ids)", None)
            .unwrap_err();
        assert!(matches!(err, QuarryError::Binding { .. }));

        assert_eq!(source.idle_count(), source.open_count());
    }

    #[test]
    fn test_reject_policy_and_unknown_datasource() {
        let fx = Fixture::new();
        let strict = QueryExecutor::new(Arc::clone(fx.executor.registry()))
            .with_missing_parameter_policy(MissingParameterPolicy::Reject);
        let ctx = fx.ctx(Scope::new());
        let err = strict
            .run_select(&ctx, "select name from users where id = :id", None)
            .unwrap_err();
        assert!(matches!(err, QuarryError::Binding { .. }));

        let err = fx.executor.run_select(&ctx, "select 1", Some("reporting")).unwrap_err();
        assert!(matches!(err, QuarryError::Configuration { .. }));
    }
}
