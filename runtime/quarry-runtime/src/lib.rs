///
/// quarry Runtime
///
/// The surface a host interpreter calls into. `Database` exposes the SQL
/// operations over one shared `QueryExecutor`; `FunctionTable` maps the
/// builtin names (`database::runSelect`, ...) to those operations and checks
/// call arguments before dispatching.
///
/// Contains:
/// - Database facade (execute, runUpdate, runSelect, registerDatasource,
///   expectEquals, expectEqualsFatal)
/// - Builtin registration table and argument validation
/// - All standard library types via quarry-std-* re-exports
///

pub mod builtins;

use std::path::Path;
use std::sync::Arc;

use quarry_std_database::{DatasourceConfig, DatasourceRegistry, QueryExecutor};
use quarry_std_env::{ConfigLookup, EnvironmentConfig};
use quarry_std_testing::{column_labels, generate_with_labels, verify, ProcedureRunner, QuerySource, Severity};
use tracing::info;

pub use builtins::{get_builtin_registry, BuiltinFunction, FunctionTable, Param, ParamKind};
pub use quarry_std_core::*;

pub struct Database {
    executor: QueryExecutor,
}

impl Database {
    pub fn new(lookup: Arc<dyn ConfigLookup>) -> Self {
        Self::from_executor(QueryExecutor::new(Arc::new(DatasourceRegistry::new(lookup))))
    }

    /// Datasources configured by a TOML file with `[environment.<env>.database]` tables
    pub fn from_config_file(path: &Path) -> QuarryResult<Self> {
        Ok(Self::new(Arc::new(EnvironmentConfig::load(path)?)))
    }

    pub fn from_executor(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Select rows, or a single `[affected, key*]` row for anything else
    pub fn execute(&self, ctx: &ExecutionContext, sql: &str, datasource: Option<&str>) -> QuarryResult<Vec<Row>> {
        self.executor.execute_rows(ctx, sql, datasource)
    }

    /// `[affected, key*]`
    pub fn run_update(&self, ctx: &ExecutionContext, sql: &str, datasource: Option<&str>) -> QuarryResult<Row> {
        self.executor.run_update(ctx, sql, datasource).map(|result| result.into_row())
    }

    pub fn run_select(&self, ctx: &ExecutionContext, sql: &str, datasource: Option<&str>) -> QuarryResult<Vec<Row>> {
        self.executor.run_select(ctx, sql, datasource)
    }

    /// Register a datasource in the context's environment. An empty name is the
    /// default datasource. Existing registrations are kept as they are.
    pub fn register_datasource(
        &self,
        ctx: &ExecutionContext,
        name: &str,
        driver: &str,
        jdbc_url: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> QuarryResult<()> {
        let name = Some(name).filter(|name| !name.is_empty());
        let config = DatasourceConfig::new(driver, jdbc_url)
            .with_credentials(username.map(str::to_string), password.map(str::to_string));
        let source = self.executor.registry().register_source(ctx.environment(), name, config)?;
        info!(datasource = %source.key(), "datasource registered");
        Ok(())
    }

    /// Verify `sql` against `expected`, recording failures on `ctx`. Returns
    /// whether every check held.
    pub fn expect_equals(
        &self,
        ctx: &mut ExecutionContext,
        description: &str,
        sql: &str,
        expected: Option<&[Value]>,
    ) -> QuarryResult<bool> {
        self.verify(Severity::Soft, ctx, description, sql, expected)
    }

    /// Like `expect_equals`, but the first failed check is returned as
    /// `QuarryError::Assertion`.
    pub fn expect_equals_fatal(
        &self,
        ctx: &mut ExecutionContext,
        description: &str,
        sql: &str,
        expected: Option<&[Value]>,
    ) -> QuarryResult<bool> {
        self.verify(Severity::Fatal, ctx, description, sql, expected)
    }

    fn verify(
        &self,
        severity: Severity,
        ctx: &mut ExecutionContext,
        description: &str,
        sql: &str,
        expected: Option<&[Value]>,
    ) -> QuarryResult<bool> {
        // The select is templated when it runs; label the columns it will have.
        let fields = column_labels(&self.executor.render(sql, &ctx.scope)?);
        let generated = generate_with_labels(severity, description, sql, &fields, expected);
        let source = ExecutorSource(&self.executor);
        let report = verify(&ProcedureRunner::new(&source), ctx, &generated)?;
        Ok(report.passed())
    }
}

/// Procedure selects go to the default datasource of the forked context
struct ExecutorSource<'a>(&'a QueryExecutor);

impl QuerySource for ExecutorSource<'_> {
    fn run_select(&self, ctx: &ExecutionContext, sql: &str) -> QuarryResult<Vec<Row>> {
        self.0.run_select(ctx, sql, None)
    }
}
