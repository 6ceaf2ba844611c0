//! PooledSource: bounded connection pool for one datasource.
//!
//! Connections are handed out as `PooledConnection` guards and go back to the
//! idle list when the guard drops, so every exit path of a caller releases its
//! connection. Callers beyond `max_pool_size` wait on a condvar for at most
//! `connection_timeout`.

use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use quarry_std_core::{QuarryError, QuarryResult};
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::config::{DatasourceConfig, DatasourceKey};
use crate::driver::ConnectionFactory;

struct PoolState {
    idle: Vec<Connection>,
    open: usize,
}

pub struct PooledSource {
    key: DatasourceKey,
    config: DatasourceConfig,
    factory: ConnectionFactory,
    max_size: usize,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl PooledSource {
    /// Build the pool and open its first connection, so an unusable driver or
    /// URL fails here rather than on the first statement.
    pub fn new(key: DatasourceKey, config: DatasourceConfig) -> QuarryResult<Self> {
        let factory = ConnectionFactory::new(&key, &config)?;
        // An in-memory database is private to its connection.
        let max_size = if factory.target().is_memory() {
            1
        } else {
            config.max_pool_size.max(1)
        };

        let first = factory.connect().map_err(|e| QuarryError::Configuration {
            key: key.config_key("jdbcUrl"),
            reason: format!("cannot open '{}': {}", config.jdbc_url, e),
        })?;

        debug!(datasource = %key, max_size, "created connection pool");

        Ok(Self {
            key,
            config,
            factory,
            max_size,
            state: Mutex::new(PoolState {
                idle: vec![first],
                open: 1,
            }),
            available: Condvar::new(),
        })
    }

    pub fn key(&self) -> &DatasourceKey {
        &self.key
    }

    pub fn config(&self) -> &DatasourceConfig {
        &self.config
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn idle_count(&self) -> usize {
        self.lock().map(|state| state.idle.len()).unwrap_or(0)
    }

    pub fn open_count(&self) -> usize {
        self.lock().map(|state| state.open).unwrap_or(0)
    }

    /// Take a connection, opening a new one while below `max_size`.
    pub fn acquire(&self) -> QuarryResult<PooledConnection<'_>> {
        let deadline = Instant::now() + self.config.connection_timeout;
        let mut state = self.lock()?;

        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection::new(self, conn));
            }

            if state.open < self.max_size {
                state.open += 1;
                drop(state);
                return match self.factory.connect() {
                    Ok(conn) => Ok(PooledConnection::new(self, conn)),
                    Err(e) => {
                        self.forget_one();
                        Err(self.connection_error(e.to_string()))
                    }
                };
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining == Duration::ZERO {
                return Err(self.connection_error(format!(
                    "pool exhausted: {} connections in use after waiting {:?}",
                    self.max_size, self.config.connection_timeout
                )));
            }
            state = self
                .available
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .map_err(|e| self.connection_error(format!("pool lock poisoned: {}", e)))?;
        }
    }

    fn release(&self, conn: Connection) {
        if !conn.is_autocommit() {
            warn!(datasource = %self.key, "connection returned inside a transaction, rolling back");
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                warn!(datasource = %self.key, error = %e, "rollback failed, discarding connection");
                drop(conn);
                self.forget_one();
                return;
            }
        }
        match self.state.lock() {
            Ok(mut state) => {
                state.idle.push(conn);
                drop(state);
                self.available.notify_one();
            }
            Err(e) => warn!(datasource = %self.key, error = %e, "pool lock poisoned, dropping connection"),
        }
    }

    fn forget_one(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.open = state.open.saturating_sub(1);
        }
        self.available.notify_one();
    }

    fn lock(&self) -> QuarryResult<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|e| self.connection_error(format!("pool lock poisoned: {}", e)))
    }

    fn connection_error(&self, reason: String) -> QuarryError {
        QuarryError::Connection {
            datasource: self.key.to_string(),
            reason,
        }
    }
}

impl std::fmt::Debug for PooledSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSource")
            .field("key", &self.key)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

/// Exclusive use of one pooled connection until dropped
pub struct PooledConnection<'a> {
    source: &'a PooledSource,
    conn: ManuallyDrop<Connection>,
}

impl<'a> PooledConnection<'a> {
    fn new(source: &'a PooledSource, conn: Connection) -> Self {
        Self {
            source,
            conn: ManuallyDrop::new(conn),
        }
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        // SAFETY: `conn` is taken exactly once, here, and the guard is never
        // touched again after drop.
        let conn = unsafe { ManuallyDrop::take(&mut self.conn) };
        self.source.release(conn);
    }
}
