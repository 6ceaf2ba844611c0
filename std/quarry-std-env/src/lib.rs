///
/// quarry-std-env - Environment Configuration
///
/// Resolves configuration values per execution environment and expands
/// `${name}` references in SQL text before placeholders are scanned.
///
/// ## Functions
///
/// - `ConfigLookup::lookup(environment, key) -> option<string>` - Resolve a dotted key
/// - `EnvironmentConfig::load(path)` - Read a TOML configuration file
/// - `expand(text, scope) -> string` - Expand `${name}` from the variable scope
///
/// ## Configuration File
///
/// ```toml
/// [environment.dev.database]
/// driver = "sqlite"
/// jdbcUrl = "jdbc:sqlite::memory:"
///
/// [environment.dev.database.reporting]
/// driver = "sqlite"
/// jdbcUrl = "sqlite:/var/lib/reporting.db"
/// ```
///
/// resolves `database.driver` and `database.reporting.jdbcUrl` in environment `dev`.
///

pub mod config;
pub mod template;

pub use config::{ConfigLookup, EnvironmentConfig};
pub use template::expand;
