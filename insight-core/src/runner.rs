//! Compiling and executing insights against an engine.
//!
//! [`InsightRunner`] ties the compiler to a [`QueryEngine`] and memoizes both
//! compiled statements and materialized views by [`SpecKey`].

use std::sync::Arc;

use arrow::array::{Array, Int64Array};
use arrow::record_batch::RecordBatch;
use tracing::{info, instrument};

use crate::cache::{CacheConfig, CompiledSqlCache, SpecKey};
use crate::engine::QueryEngine;
use crate::error::{ErrorContext, InsightError, Result};
use crate::model::{FieldResolver, InsightSpec, TableId};
use crate::sql::{InsightCompiler, SqlFormatter};

/// Prefix of views created by [`InsightRunner::materialize_view`].
pub const VIEW_PREFIX: &str = "insight_";

/// Runs insights against a shared engine.
///
/// Compiled statements are cached per spec content. The cache does not key on
/// the field resolver: field ids are expected to keep resolving to the same
/// columns for the lifetime of the runner.
pub struct InsightRunner {
    engine: Arc<dyn QueryEngine>,
    compiler: InsightCompiler,
    statements: CompiledSqlCache,
    views: CompiledSqlCache,
}

impl InsightRunner {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self::with_compiler(engine, InsightCompiler::new(), CacheConfig::default())
    }

    pub fn with_compiler(
        engine: Arc<dyn QueryEngine>,
        compiler: InsightCompiler,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            engine,
            compiler,
            statements: CompiledSqlCache::with_config(cache_config.clone()),
            views: CompiledSqlCache::with_config(cache_config),
        }
    }

    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    pub fn compiler(&self) -> &InsightCompiler {
        &self.compiler
    }

    pub fn statements(&self) -> &CompiledSqlCache {
        &self.statements
    }

    fn table_ids(spec: &InsightSpec) -> Vec<TableId> {
        spec.tables().map(|t| t.id.clone()).collect()
    }

    /// Compiles the insight, reusing an earlier compilation of an equal spec.
    #[instrument(skip(self, spec, resolver), fields(base = %spec.base_table.display_name))]
    pub async fn compile(
        &self,
        spec: &InsightSpec,
        resolver: &dyn FieldResolver,
    ) -> Result<Arc<str>> {
        let key = SpecKey::of(spec)?;
        self.statements
            .get_or_compile(&key, Self::table_ids(spec), || async {
                self.compiler.compile(spec, resolver)
            })
            .await
    }

    /// Compiles and executes the insight.
    #[instrument(skip(self, spec, resolver), fields(base = %spec.base_table.display_name))]
    pub async fn run(
        &self,
        spec: &InsightSpec,
        resolver: &dyn FieldResolver,
    ) -> Result<Vec<RecordBatch>> {
        let sql = self.compile(spec, resolver).await?;
        let batches = self.engine.query(&sql).await?;
        info!(
            rows = batches.iter().map(RecordBatch::num_rows).sum::<usize>(),
            "Executed insight"
        );
        Ok(batches)
    }

    /// Counts the rows the insight yields without `limit`/`offset`.
    #[instrument(skip(self, spec, resolver), fields(base = %spec.base_table.display_name))]
    pub async fn count(&self, spec: &InsightSpec, resolver: &dyn FieldResolver) -> Result<u64> {
        let sql = self.compiler.compile_count(spec, resolver)?;
        let batches = self.engine.query(&sql).await?;
        batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .and_then(|b| b.column_by_name("total_rows"))
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .filter(|a| !a.is_null(0))
            .map(|a| a.value(0).max(0) as u64)
            .ok_or_else(|| InsightError::Internal("count query returned no total".to_string()))
    }

    /// Creates (or reuses) a view over the insight and returns its name.
    ///
    /// The view is named `insight_<first 16 hex digits of the spec key>` and
    /// is created once per key, even under concurrent requests.
    #[instrument(skip(self, spec, resolver), fields(base = %spec.base_table.display_name))]
    pub async fn materialize_view(
        &self,
        spec: &InsightSpec,
        resolver: &dyn FieldResolver,
    ) -> Result<String> {
        let key = SpecKey::of(spec)?;
        let view_name = format!("{VIEW_PREFIX}{}", key.short());

        let name = self
            .views
            .get_or_compile(&key, Self::table_ids(spec), || async {
                let sql = self.compile(spec, resolver).await?;
                let ddl = format!(
                    "CREATE OR REPLACE VIEW {} AS {sql}",
                    SqlFormatter::quote_identifier(&view_name)
                );
                self.engine
                    .query(&ddl)
                    .await
                    .with_context(|| format!("Failed to create view {view_name}"))?;
                info!(view = %view_name, "Materialized insight view");
                Ok(view_name.clone())
            })
            .await?;
        Ok(name.to_string())
    }

    /// Forgets compiled statements and views that read from a table.
    pub fn invalidate_table(&self, table_id: &str) -> usize {
        self.statements.invalidate_table(table_id) + self.views.invalidate_table(table_id)
    }

    pub fn clear(&self) {
        self.statements.clear();
        self.views.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DataFusionEngine, EngineConfig};
    use crate::model::{FieldCatalog, FieldDescriptor, FieldType, JoinSpec, JoinType, TableHandle};
    use arrow::array::StringArray;
    use arrow::datatypes::{DataType, Field, Schema};

    struct Fixture {
        runner: InsightRunner,
        engine: Arc<DataFusionEngine>,
        users: TableHandle,
        orders: TableHandle,
        fields: FieldCatalog,
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(DataFusionEngine::with_config(EngineConfig::lightweight()).unwrap());

        let users = RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("name", DataType::Utf8, false),
            ])),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec!["Ann", "Bo", "Cy"])),
            ],
        )
        .unwrap();
        let orders = RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("user_id", DataType::Int64, false),
            ])),
            vec![
                Arc::new(Int64Array::from(vec![10, 11, 12, 13])),
                Arc::new(Int64Array::from(vec![1, 1, 2, 9])),
            ],
        )
        .unwrap();

        let users = engine.register_batches("Users", vec![users]).unwrap();
        let orders = engine.register_batches("Orders", vec![orders]).unwrap();
        let fields: FieldCatalog = vec![
            FieldDescriptor::column("u.id", users.id.clone(), "id", FieldType::Number),
            FieldDescriptor::column("u.name", users.id.clone(), "name", FieldType::String),
            FieldDescriptor::column("o.user_id", orders.id.clone(), "user_id", FieldType::Number),
        ]
        .into_iter()
        .collect();

        Fixture {
            runner: InsightRunner::new(engine.clone()),
            engine,
            users,
            orders,
            fields,
        }
    }

    #[tokio::test]
    async fn test_compile_is_cached() {
        let f = fixture();
        let spec = InsightSpec::new(f.users.clone()).select(["u.name"]);

        let first = f.runner.compile(&spec, &f.fields).await.unwrap();
        let second = f.runner.compile(&spec, &f.fields).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.runner.statements().stats().misses, 1);
    }

    #[tokio::test]
    async fn test_run_and_count() {
        let f = fixture();
        let spec = InsightSpec::new(f.users.clone())
            .join(JoinSpec::new(f.orders.clone(), "u.id", "o.user_id", JoinType::Inner))
            .limit(1);

        let batches = f.runner.run(&spec, &f.fields).await.unwrap();
        assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 1);
        assert_eq!(f.runner.count(&spec, &f.fields).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_materialize_view_once() {
        let f = fixture();
        let spec = InsightSpec::new(f.users.clone()).select(["u.name"]);

        let name = f.runner.materialize_view(&spec, &f.fields).await.unwrap();
        assert!(name.starts_with(VIEW_PREFIX));
        assert_eq!(name.len(), VIEW_PREFIX.len() + 16);
        assert!(f.engine.has_table(&name));

        let again = f.runner.materialize_view(&spec, &f.fields).await.unwrap();
        assert_eq!(name, again);

        let rows = f
            .engine
            .query(&format!("SELECT COUNT(*) AS n FROM \"{name}\""))
            .await
            .unwrap();
        let n = rows[0].column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(n.value(0), 3);
    }

    #[tokio::test]
    async fn test_compilation_errors_are_not_cached() {
        let f = fixture();
        let spec = InsightSpec::new(f.users.clone()).join(JoinSpec::new(
            f.orders.clone(),
            "u.id",
            "missing",
            JoinType::Left,
        ));

        let err = f.runner.compile(&spec, &f.fields).await.unwrap_err();
        assert!(err.is_compilation_error());
        assert_eq!(f.runner.statements().stats().entries, 1);
        assert!(!f.runner.statements().is_ready(&SpecKey::of(&spec).unwrap()));
    }

    #[tokio::test]
    async fn test_invalidate_table() {
        let f = fixture();
        let users_only = InsightSpec::new(f.users.clone());
        let joined = InsightSpec::new(f.users.clone()).join(JoinSpec::new(
            f.orders.clone(),
            "u.id",
            "o.user_id",
            JoinType::Left,
        ));
        f.runner.compile(&users_only, &f.fields).await.unwrap();
        f.runner.compile(&joined, &f.fields).await.unwrap();

        assert_eq!(f.runner.invalidate_table(&f.orders.id), 1);
        assert_eq!(f.runner.invalidate_table(&f.users.id), 1);
        assert!(f.runner.statements().is_empty());
    }
}
