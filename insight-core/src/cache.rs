//! Compiled SQL cache keyed by insight content.
//!
//! Keys are a SHA-256 over the serialized [`InsightSpec`], tables included,
//! so two structurally equal specs share an entry no matter where they came
//! from and any structural change produces a new key. Each entry is a
//! [`tokio::sync::OnceCell`]: concurrent requests for a key that is still
//! being compiled wait for the first one instead of compiling again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::Result;
use crate::model::{InsightSpec, TableId};

/// Content hash of an [`InsightSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecKey(String);

impl SpecKey {
    /// Hashes the spec and every table handle it references.
    pub fn of(spec: &InsightSpec) -> Result<Self> {
        let encoded = serde_json::to_vec(spec)?;
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Full hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 hex characters, for names derived from the key.
    pub fn short(&self) -> &str {
        &self.0[..16]
    }
}

impl std::fmt::Display for SpecKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration for [`CompiledSqlCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries; the oldest entry is evicted beyond it
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 256 }
    }
}

#[derive(Debug)]
struct CacheEntry {
    cell: Arc<OnceCell<Arc<str>>>,
    tables: Vec<TableId>,
    inserted: Instant,
}

/// Statistics about the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Map of spec keys to compiled statements, one compilation per key.
#[derive(Debug, Default)]
pub struct CompiledSqlCache {
    entries: Mutex<HashMap<SpecKey, CacheEntry>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CompiledSqlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SpecKey, CacheEntry>> {
        // the map stays consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cell_for(&self, key: &SpecKey, tables: Vec<TableId>) -> Arc<OnceCell<Arc<str>>> {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry.cell.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        if entries.len() >= self.config.max_entries.max(1) {
            // in-flight compilations are only evicted when nothing else is ready
            let oldest = entries
                .iter()
                .filter(|(_, e)| e.cell.initialized())
                .min_by_key(|(_, e)| e.inserted)
                .or_else(|| entries.iter().min_by_key(|(_, e)| e.inserted))
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(key = %oldest.short(), "Evicting compiled statement");
                entries.remove(&oldest);
            }
        }

        let cell = Arc::new(OnceCell::new());
        entries.insert(
            key.clone(),
            CacheEntry {
                cell: cell.clone(),
                tables,
                inserted: Instant::now(),
            },
        );
        cell
    }

    /// Returns the cached statement for `key`, running `init` at most once
    /// across concurrent callers.
    ///
    /// A failed `init` leaves the entry empty; the next caller retries.
    pub async fn get_or_compile<F, Fut>(
        &self,
        key: &SpecKey,
        tables: Vec<TableId>,
        init: F,
    ) -> Result<Arc<str>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let cell = self.cell_for(key, tables);
        let value = cell
            .get_or_try_init(|| async { init().await.map(Arc::from) })
            .await?;
        Ok(value.clone())
    }

    /// Whether a finished statement is cached for `key`.
    pub fn is_ready(&self, key: &SpecKey) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|e| e.cell.initialized())
    }

    pub fn invalidate(&self, key: &SpecKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drops every entry that reads from `table_id`; returns how many.
    pub fn invalidate_table(&self, table_id: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.tables.iter().any(|t| t == table_id));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
