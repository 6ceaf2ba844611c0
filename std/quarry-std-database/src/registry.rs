//! DatasourceRegistry: lazily created pooled datasources keyed by
//! (environment, name).
//!
//! A key maps to exactly one `PooledSource` for the registry's lifetime.
//! Lookups of populated keys take only a shard read lock; population goes
//! through `entry().or_try_insert_with`, which holds the shard write lock
//! across the check and the construction, so racing first callers create one
//! pool and all observe the same `Arc`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use quarry_std_core::QuarryResult;
use quarry_std_env::ConfigLookup;
use tracing::{debug, info};

use crate::config::{DatasourceConfig, DatasourceKey};
use crate::pool::PooledSource;

pub struct DatasourceRegistry {
    sources: DashMap<DatasourceKey, Arc<PooledSource>>,
    lookup: Arc<dyn ConfigLookup>,
    pools_created: AtomicUsize,
}

impl DatasourceRegistry {
    pub fn new(lookup: Arc<dyn ConfigLookup>) -> Self {
        Self {
            sources: DashMap::new(),
            lookup,
            pools_created: AtomicUsize::new(0),
        }
    }

    /// The pool for `(environment, name)`, created from configuration on first use.
    pub fn get_source(&self, environment: &str, name: Option<&str>) -> QuarryResult<Arc<PooledSource>> {
        let key = DatasourceKey::new(environment, name);
        if let Some(source) = self.sources.get(&key) {
            return Ok(Arc::clone(source.value()));
        }

        let entry = self.sources.entry(key.clone()).or_try_insert_with(|| {
            let config = DatasourceConfig::resolve(self.lookup.as_ref(), &key)?;
            self.build(key.clone(), config)
        })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Register a datasource explicitly. A key that already has a pool is left
    /// untouched; the new settings are ignored.
    pub fn register_source(
        &self,
        environment: &str,
        name: Option<&str>,
        config: DatasourceConfig,
    ) -> QuarryResult<Arc<PooledSource>> {
        let key = DatasourceKey::new(environment, name);
        if let Some(source) = self.sources.get(&key) {
            debug!(datasource = %key, "datasource already registered, keeping existing pool");
            return Ok(Arc::clone(source.value()));
        }

        let entry = self
            .sources
            .entry(key.clone())
            .or_try_insert_with(|| self.build(key.clone(), config))?;
        Ok(Arc::clone(entry.value()))
    }

    pub fn contains(&self, environment: &str, name: Option<&str>) -> bool {
        self.sources.contains_key(&DatasourceKey::new(environment, name))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Number of pools constructed so far
    pub fn pools_created(&self) -> usize {
        self.pools_created.load(Ordering::SeqCst)
    }

    fn build(&self, key: DatasourceKey, config: DatasourceConfig) -> QuarryResult<Arc<PooledSource>> {
        let source = PooledSource::new(key, config)?;
        self.pools_created.fetch_add(1, Ordering::SeqCst);
        info!(datasource = %source.key(), url = %source.config().jdbc_url, "datasource ready");
        Ok(Arc::new(source))
    }
}
