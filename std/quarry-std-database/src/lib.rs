///
/// quarry Database Support
///
/// Turns template SQL with named `:placeholders` into executed, type-coerced
/// statements against pooled datasources. Uses rusqlite with bundled SQLite
/// for zero system dependency.
///
/// Architecture:
/// - Datasources are keyed by (environment, name) in a `DatasourceRegistry`
///   and created lazily from `ConfigLookup` on first use, exactly once per key.
/// - Each `PooledSource` hands out RAII connection guards; a connection goes
///   back to the pool on every exit path, including errors.
/// - SQL is templated, then compiled into a `?` template plus ordered
///   parameter names, then bound from the caller's `Scope`.
/// - Query results are eagerly materialized into `Vec<Row>` so callers get
///   random access and a size.
///
/// Modules:
/// - config: DatasourceKey, DatasourceConfig, pool settings
/// - driver: driver name and connection URL handling
/// - pool: PooledSource and PooledConnection
/// - registry: DatasourceRegistry
/// - compiler: placeholder scanning
/// - binder: value coercion and binding
/// - materializer: cursor to rows
/// - executor: QueryExecutor, statement keyword dispatch
///

pub mod binder;
pub mod compiler;
pub mod config;
pub mod driver;
pub mod executor;
pub mod materializer;
pub mod pool;
pub mod registry;

pub use binder::MissingParameterPolicy;
pub use compiler::{compile, PreparedQuery};
pub use config::{DatasourceConfig, DatasourceKey};
pub use executor::{statement_keyword, NoTemplating, QueryExecutor, QueryOutcome, ScopeTemplater, Templater, UpdateResult};
pub use pool::{PooledConnection, PooledSource};
pub use registry::DatasourceRegistry;
