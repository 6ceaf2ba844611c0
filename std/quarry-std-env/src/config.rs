///
/// # Environment Configuration
///
/// Configuration values are plain strings addressed by dotted keys and scoped
/// to an execution environment. The same key can hold different values in
/// `dev` and `test`; nothing is shared between environments.
///
/// `EnvironmentConfig` reads them from TOML. Every table below
/// `[environment.<name>]` is flattened into dotted keys, so
///
/// ```toml
/// [environment.test.database.reporting]
/// maxPoolSize = 4
/// ```
///
/// is looked up as `database.reporting.maxPoolSize` in environment `test`.
/// Integers, floats and booleans are stored in their TOML text form.
///

use std::path::Path;

use indexmap::IndexMap;
use quarry_std_core::{QuarryError, QuarryResult};
use serde::Deserialize;

pub trait ConfigLookup: Send + Sync {
    fn lookup(&self, environment: &str, key: &str) -> Option<String>;
}

impl<F> ConfigLookup for F
where
    F: Fn(&str, &str) -> Option<String> + Send + Sync,
{
    fn lookup(&self, environment: &str, key: &str) -> Option<String> {
        self(environment, key)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    environment: IndexMap<String, toml::Table>,
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentConfig {
    environments: IndexMap<String, IndexMap<String, String>>,
}

impl EnvironmentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> QuarryResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| QuarryError::Configuration {
            key: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> QuarryResult<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| QuarryError::Configuration {
            key: "environment".to_string(),
            reason: e.to_string(),
        })?;

        let mut config = EnvironmentConfig::new();
        for (name, table) in &file.environment {
            let mut flat = IndexMap::new();
            flatten("", table, &mut flat).map_err(|key| QuarryError::Configuration {
                key: format!("environment.{}.{}", name, key),
                reason: "arrays are not supported as configuration values".to_string(),
            })?;
            config.environments.insert(name.clone(), flat);
        }
        Ok(config)
    }

    pub fn set(&mut self, environment: &str, key: &str, value: impl Into<String>) {
        self.environments
            .entry(environment.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn with(mut self, environment: &str, key: &str, value: impl Into<String>) -> Self {
        self.set(environment, key, value);
        self
    }

    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(String::as_str)
    }

    pub fn get(&self, environment: &str, key: &str) -> Option<&str> {
        self.environments.get(environment)?.get(key).map(String::as_str)
    }
}

impl ConfigLookup for EnvironmentConfig {
    fn lookup(&self, environment: &str, key: &str) -> Option<String> {
        self.get(environment, key).map(str::to_string)
    }
}

/// Returns the offending dotted key on an unsupported value
fn flatten(
    prefix: &str,
    table: &toml::Table,
    out: &mut IndexMap<String, String>,
) -> Result<(), String> {
    for (key, value) in table {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(nested) => flatten(&full, nested, out)?,
            toml::Value::String(s) => {
                out.insert(full, s.clone());
            }
            toml::Value::Integer(i) => {
                out.insert(full, i.to_string());
            }
            toml::Value::Float(x) => {
                out.insert(full, x.to_string());
            }
            toml::Value::Boolean(b) => {
                out.insert(full, b.to_string());
            }
            toml::Value::Datetime(dt) => {
                out.insert(full, dt.to_string());
            }
            toml::Value::Array(_) => return Err(full),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flattens_nested_tables() {
        let content = r#"
[environment.dev.database]
driver = "sqlite"
jdbcUrl = "jdbc:sqlite::memory:"

[environment.dev.database.reporting]
driver = "org.sqlite.JDBC"
jdbcUrl = "sqlite:/var/lib/reporting.db"
maxPoolSize = 4

[environment.test.database]
driver = "sqlite"
jdbcUrl = "sqlite:/tmp/test.db"
"#;
        let config = EnvironmentConfig::parse(content).expect("valid config");

        assert_eq!(config.get("dev", "database.driver"), Some("sqlite"));
        assert_eq!(config.get("dev", "database.jdbcUrl"), Some("jdbc:sqlite::memory:"));
        assert_eq!(config.get("dev", "database.reporting.driver"), Some("org.sqlite.JDBC"));
        assert_eq!(config.get("dev", "database.reporting.maxPoolSize"), Some("4"));
        assert_eq!(config.get("test", "database.jdbcUrl"), Some("sqlite:/tmp/test.db"));
        assert_eq!(config.get("test", "database.reporting.driver"), None);
        assert_eq!(config.environments().count(), 2);
    }

    #[test]
    fn test_environments_are_isolated() {
        let config = EnvironmentConfig::new()
            .with("dev", "database.jdbcUrl", "sqlite::memory:")
            .with("prod", "database.jdbcUrl", "sqlite:/srv/prod.db");

        assert_eq!(config.lookup("dev", "database.jdbcUrl").as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.lookup("prod", "database.jdbcUrl").as_deref(), Some("sqlite:/srv/prod.db"));
        assert_eq!(config.lookup("staging", "database.jdbcUrl"), None);
    }

    #[test]
    fn test_arrays_are_rejected() {
        let content = r#"
[environment.dev.database]
hosts = ["a", "b"]
"#;
        match EnvironmentConfig::parse(content) {
            Err(QuarryError::Configuration { key, .. }) => {
                assert_eq!(key, "environment.dev.database.hosts");
            }
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            EnvironmentConfig::parse("[environment.dev"),
            Err(QuarryError::Configuration { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("quarry.toml");
        std::fs::write(&path, "[environment.ci.database]\ndriver = \"sqlite\"\n").unwrap();

        let config = EnvironmentConfig::load(&path).expect("load config");
        assert_eq!(config.get("ci", "database.driver"), Some("sqlite"));

        let missing = EnvironmentConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(QuarryError::Configuration { .. })));
    }

    #[test]
    fn test_closure_lookup() {
        let lookup = |env: &str, key: &str| {
            (env == "dev" && key == "database.driver").then(|| "sqlite".to_string())
        };
        assert_eq!(lookup.lookup("dev", "database.driver").as_deref(), Some("sqlite"));
        assert_eq!(ConfigLookup::lookup(&lookup, "prod", "database.driver"), None);
    }
}
