///
/// Datasource identity and configuration.
///
/// A datasource is addressed by the active environment plus an optional
/// logical name (`None` is the default datasource). Its configuration is read
/// once, on first use, from keys of the form
///
/// - `database.driver`, `database.jdbcUrl`, ... for the default datasource
/// - `database.<name>.driver`, `database.<name>.jdbcUrl`, ... for named ones
///
/// `driver` and `jdbcUrl` are required; `username`, `password`, `maxPoolSize`
/// and `connectionTimeout` (milliseconds) are optional.
///

use std::fmt;
use std::time::Duration;

use quarry_std_core::{QuarryError, QuarryResult};
use quarry_std_env::ConfigLookup;

pub const DEFAULT_MAX_POOL_SIZE: usize = 10;
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasourceKey {
    environment: String,
    name: Option<String>,
}

impl DatasourceKey {
    pub fn new(environment: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            environment: environment.into(),
            name: name.map(str::to_string),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Configuration key for `field` of this datasource
    pub fn config_key(&self, field: &str) -> String {
        match &self.name {
            None => format!("database.{}", field),
            Some(name) => format!("database.{}.{}", name, field),
        }
    }
}

impl fmt::Display for DatasourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            None => write!(f, "{}.<default>", self.environment),
            Some(name) => write!(f, "{}.{}", self.environment, name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasourceConfig {
    pub driver: String,
    pub jdbc_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auto_commit: bool,
    pub max_pool_size: usize,
    pub connection_timeout: Duration,
}

impl DatasourceConfig {
    pub fn new(driver: impl Into<String>, jdbc_url: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            jdbc_url: jdbc_url.into(),
            username: None,
            password: None,
            auto_commit: true,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn resolve(lookup: &dyn ConfigLookup, key: &DatasourceKey) -> QuarryResult<Self> {
        let required = |field: &str| {
            let config_key = key.config_key(field);
            lookup
                .lookup(key.environment(), &config_key)
                .ok_or_else(|| QuarryError::Configuration {
                    reason: format!("not set in environment '{}'", key.environment()),
                    key: config_key,
                })
        };
        let optional = |field: &str| lookup.lookup(key.environment(), &key.config_key(field));

        let mut config = DatasourceConfig::new(required("driver")?, required("jdbcUrl")?)
            .with_credentials(optional("username"), optional("password"));

        if let Some(size) = optional("maxPoolSize") {
            config.max_pool_size = parse_number(key, "maxPoolSize", &size)?;
            if config.max_pool_size == 0 {
                return Err(QuarryError::Configuration {
                    key: key.config_key("maxPoolSize"),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if let Some(timeout) = optional("connectionTimeout") {
            let millis: u64 = parse_number(key, "connectionTimeout", &timeout)?;
            config.connection_timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &DatasourceKey, field: &str, raw: &str) -> QuarryResult<T> {
    raw.trim().parse().map_err(|_| QuarryError::Configuration {
        key: key.config_key(field),
        reason: format!("expected a number, found '{}'", raw),
    })
}
