///
/// Driver selection and connection URLs.
///
/// Only SQLite is available. Accepted driver names (case-insensitive):
/// `sqlite`, `sqlite3`, `org.sqlite.JDBC`.
///
/// Accepted URLs:
/// - `jdbc:sqlite:<path>`
/// - `sqlite:<path>` and `sqlite://<path>`
///
/// An empty path or `:memory:` opens an in-memory database. In-memory
/// databases live exactly as long as their single connection, so the pool
/// keeps that connection for its whole lifetime.
///

use std::path::PathBuf;
use std::time::Duration;

use quarry_std_core::{QuarryError, QuarryResult};
use rusqlite::Connection;

use crate::config::{DatasourceConfig, DatasourceKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
}

impl Driver {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" | "org.sqlite.jdbc" => Some(Driver::Sqlite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    Memory,
    File(PathBuf),
}

impl SqliteTarget {
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        let rest = url
            .strip_prefix("jdbc:sqlite:")
            .or_else(|| url.strip_prefix("sqlite://"))
            .or_else(|| url.strip_prefix("sqlite:"))?;

        if rest.is_empty() || rest == ":memory:" {
            Some(SqliteTarget::Memory)
        } else {
            Some(SqliteTarget::File(PathBuf::from(rest)))
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, SqliteTarget::Memory)
    }
}

/// Opens driver connections for one datasource
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    driver: Driver,
    target: SqliteTarget,
    busy_timeout: Duration,
}

impl ConnectionFactory {
    pub fn new(key: &DatasourceKey, config: &DatasourceConfig) -> QuarryResult<Self> {
        let driver = Driver::from_name(&config.driver).ok_or_else(|| QuarryError::Configuration {
            key: key.config_key("driver"),
            reason: format!("unsupported driver '{}'", config.driver),
        })?;
        let target = SqliteTarget::parse(&config.jdbc_url).ok_or_else(|| QuarryError::Configuration {
            key: key.config_key("jdbcUrl"),
            reason: format!("'{}' is not a sqlite connection string", config.jdbc_url),
        })?;
        Ok(Self {
            driver,
            target,
            busy_timeout: config.connection_timeout,
        })
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn target(&self) -> &SqliteTarget {
        &self.target
    }

    pub fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = match &self.target {
            SqliteTarget::Memory => Connection::open_in_memory()?,
            SqliteTarget::File(path) => Connection::open(path)?,
        };
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}
