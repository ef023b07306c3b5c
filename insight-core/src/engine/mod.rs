//! The columnar query backend.
//!
//! Everything above this module talks to the engine through [`QueryEngine`]:
//! a statement goes in, Arrow record batches come out. [`DataFusionEngine`]
//! is the in-process implementation backed by a DataFusion
//! [`SessionContext`] tuned the same way for every caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::memory_pool::{FairSpillPool, MemoryPool};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use datafusion::sql::TableReference;
use tracing::{debug, instrument};

use crate::error::{InsightError, Result};
use crate::logging::{truncate_field, LogConfig};
use crate::model::{ColumnDescriptor, TableHandle};
use crate::sql::display_name;

/// Longest readable part of a generated engine table name.
const MAX_NAME_SLUG: usize = 32;

/// A backend that executes SQL and reports the tables it holds.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Runs a statement and collects every result batch.
    async fn query(&self, sql: &str) -> Result<Vec<RecordBatch>>;

    /// Whether a table or view with this engine name is registered.
    fn has_table(&self, name: &str) -> bool;
}

/// Configuration for a [`DataFusionEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
    /// Maximum memory for query execution (in bytes)
    pub max_memory: usize,
    /// Memory fraction to use before spilling (0.0 to 1.0)
    pub memory_fraction: f64,
    /// Logging of engine round trips
    pub log_config: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: num_cpus::get().max(1),
            max_memory: 2 * 1024 * 1024 * 1024, // 2GB
            memory_fraction: 0.9,
            log_config: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Small footprint for tests and embedded use.
    pub fn lightweight() -> Self {
        Self {
            batch_size: 1024,
            target_partitions: 1,
            max_memory: 256 * 1024 * 1024,
            ..Self::default()
        }
    }
}

/// In-process [`QueryEngine`] over a DataFusion [`SessionContext`].
///
/// Tables are registered from Arrow batches under generated lowercase names
/// (`t1_orders`, `t2_customers`, ...) so that user-facing names never reach
/// the engine unquoted.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use arrow::array::Int64Array;
/// use arrow::datatypes::{DataType, Field, Schema};
/// use arrow::record_batch::RecordBatch;
/// use insight_core::engine::{DataFusionEngine, QueryEngine};
///
/// # async fn example() -> insight_core::error::Result<()> {
/// let engine = DataFusionEngine::new()?;
/// let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
/// let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))])?;
///
/// let users = engine.register_batches("Users", vec![batch])?;
/// assert!(engine.has_table(users.engine_name().unwrap()));
/// # Ok(())
/// # }
/// ```
pub struct DataFusionEngine {
    inner: SessionContext,
    config: EngineConfig,
    next_table: AtomicU64,
}

impl DataFusionEngine {
    /// Creates an engine with the default configuration.
    #[instrument]
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    #[instrument(skip(config))]
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let session_config = SessionConfig::new()
            .with_batch_size(config.batch_size)
            .with_target_partitions(config.target_partitions)
            .with_information_schema(true);

        let pool_size = (config.max_memory as f64 * config.memory_fraction) as usize;
        let memory_pool = Arc::new(FairSpillPool::new(pool_size)) as Arc<dyn MemoryPool>;

        let runtime_env = RuntimeEnvBuilder::new()
            .with_memory_pool(memory_pool)
            .build()
            .map(Arc::new)?;

        let inner = SessionContext::new_with_config_rt(session_config, runtime_env);

        Ok(Self {
            inner,
            config,
            next_table: AtomicU64::new(1),
        })
    }

    /// Returns a reference to the underlying DataFusion [`SessionContext`].
    pub fn inner(&self) -> &SessionContext {
        &self.inner
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loads batches as a new in-memory table and returns its loaded handle.
    ///
    /// All batches must share a schema; at least one batch is required so the
    /// schema is known.
    #[instrument(skip(self, batches), fields(table = %display_name, batches = batches.len()))]
    pub fn register_batches(
        &self,
        display_name: &str,
        batches: Vec<RecordBatch>,
    ) -> Result<TableHandle> {
        let schema = batches
            .first()
            .map(RecordBatch::schema)
            .ok_or_else(|| {
                InsightError::Configuration(format!(
                    "cannot register '{display_name}' without any record batch"
                ))
            })?;

        let seq = self.next_table.fetch_add(1, Ordering::Relaxed);
        let engine_name = engine_table_name(seq, display_name);

        let columns = schema
            .fields()
            .iter()
            .map(|f| ColumnDescriptor::new(f.name(), f.data_type().to_string()))
            .collect();

        let table = MemTable::try_new(schema, vec![batches])?;
        self.inner
            .register_table(TableReference::bare(engine_name.clone()), Arc::new(table))?;

        debug!(engine_name = %engine_name, "Registered table");
        Ok(TableHandle::loaded(
            engine_name.clone(),
            display_name,
            engine_name,
            columns,
        ))
    }

    /// Drops a registered table; unloaded handles are ignored.
    #[instrument(skip(self), fields(table = %handle.display_name))]
    pub fn deregister(&self, handle: &TableHandle) -> Result<()> {
        if let Some(name) = handle.engine_name() {
            self.inner.deregister_table(TableReference::bare(name))?;
        }
        Ok(())
    }
}

#[async_trait]
impl QueryEngine for DataFusionEngine {
    #[instrument(skip(self, sql))]
    async fn query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        crate::log_engine_query!(
            self.config.log_config,
            sql = %truncate_field(sql, self.config.log_config.max_field_length),
            "Executing statement"
        );
        let df = self.inner.sql(sql).await?;
        Ok(df.collect().await?)
    }

    fn has_table(&self, name: &str) -> bool {
        self.inner
            .table_exist(TableReference::bare(name))
            .unwrap_or(false)
    }
}

/// `t<seq>_<slug>` where the slug is the readable, lowercase part of the name.
fn engine_table_name(seq: u64, display: &str) -> String {
    let slug: String = display_name(display)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(MAX_NAME_SLUG)
        .collect();
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        format!("t{seq}")
    } else {
        format!("t{seq}_{slug}")
    }
}
