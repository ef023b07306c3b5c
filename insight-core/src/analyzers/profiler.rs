//! Column profiling in two engine round trips.
//!
//! A table is profiled with one statistics statement and one samples
//! statement, each a `UNION ALL` with one branch per column, dispatched
//! concurrently:
//!
//! **Statistics**
//! - Distinct count, null count and the engine's runtime type of the column
//! - Numeric min/max/standard deviation/zero count through `TRY_CAST`, which
//!   yields null instead of failing on values that are not numbers
//!
//! **Samples**
//! - Up to `sample_limit` distinct non-null values per column, tagged with
//!   the column name and grouped client-side
//!
//! The row count is queried alongside only when the caller does not already
//! know it. Each column is then classified (see [`classify`](super::classify)).
//!
//! A column whose statistics cannot be computed degrades to an
//! [`ColumnCategory::Unknown`] row with zeroed statistics; the other columns
//! are unaffected.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{Int64Array, StringArray};
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use insight_core::analyzers::{ColumnCategory, ColumnProfiler, ProfileOptions};
//! use insight_core::engine::DataFusionEngine;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let engine = DataFusionEngine::new().unwrap();
//! let schema = Arc::new(Schema::new(vec![
//!     Field::new("id", DataType::Int64, false),
//!     Field::new("status", DataType::Utf8, true),
//! ]));
//! let batch = RecordBatch::try_new(schema, vec![
//!     Arc::new(Int64Array::from(vec![1, 2, 3])),
//!     Arc::new(StringArray::from(vec!["open", "open", "closed"])),
//! ]).unwrap();
//! let table = engine.register_batches("Tickets", vec![batch]).unwrap();
//!
//! let profiler = ColumnProfiler::builder().sample_limit(5).build();
//! let columns = profiler
//!     .profile_table(&engine, &table, &ProfileOptions::default())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(columns[0].category, ColumnCategory::Identifier);
//! assert_eq!(columns[1].category, ColumnCategory::Categorical);
//! # })
//! ```

use std::collections::HashMap;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::classify::{classify, ColumnCategory, ColumnEvidence, NativeTypeClass};
use crate::engine::QueryEngine;
use crate::error::{InsightError, Result};
use crate::model::{ColumnDescriptor, FieldDescriptor, TableHandle};
use crate::sql::SqlFormatter;

/// Configuration of the profiler and of the classification thresholds.
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Distinct non-null values sampled per column
    pub sample_limit: usize,
    /// Share of samples a value pattern must match (email, URL, UUID)
    pub pattern_threshold: f64,
    /// Uniqueness above which a column is an identifier
    pub identifier_uniqueness: f64,
    /// Cardinality a column must exceed to be an identifier by uniqueness
    pub identifier_min_cardinality: u64,
    /// Cardinality to row count ratio under which text is categorical
    pub categorical_ratio: f64,
    /// Cardinality under which text is categorical regardless of row count
    pub categorical_max_cardinality: u64,
    /// Profile all columns in one statement per query kind
    pub batched: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            sample_limit: 10,
            pattern_threshold: 0.8,
            identifier_uniqueness: 0.95,
            identifier_min_cardinality: 10,
            categorical_ratio: 0.2,
            categorical_max_cardinality: 50,
            batched: true,
        }
    }
}

/// Per-call inputs beside the table itself.
#[derive(Debug, Clone, Default)]
pub struct ProfileOptions {
    /// Row count when already known; skips the count query
    pub row_count: Option<u64>,
    /// Field descriptors whose identifier/reference hints override inference
    pub hints: Vec<FieldDescriptor>,
}

impl ProfileOptions {
    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    pub fn with_hints(mut self, hints: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        self.hints = hints.into_iter().collect();
        self
    }

    fn hint_for(&self, table: &TableHandle, column: &str) -> Option<&FieldDescriptor> {
        self.hints
            .iter()
            .find(|f| f.table_id == table.id && f.column_name.as_deref() == Some(column))
    }
}

/// Statistics and semantic category of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnAnalysis {
    pub column_name: String,
    pub native_type: String,
    pub category: ColumnCategory,
    pub cardinality: u64,
    /// Cardinality over row count, in `[0, 1]`
    pub uniqueness: f64,
    pub null_count: u64,
    pub sample_values: Vec<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std_dev: Option<f64>,
    pub zero_count: Option<u64>,
}

impl ColumnAnalysis {
    /// Row for a column whose analysis failed.
    pub fn degraded(column: &ColumnDescriptor) -> Self {
        Self {
            column_name: column.name.clone(),
            native_type: column.native_type.clone(),
            category: ColumnCategory::Unknown,
            cardinality: 0,
            uniqueness: 0.0,
            null_count: 0,
            sample_values: Vec::new(),
            min: None,
            max: None,
            std_dev: None,
            zero_count: None,
        }
    }

    /// Lightweight analysis for callers that already know the category.
    pub fn with_category(column_name: impl Into<String>, category: ColumnCategory) -> Self {
        let mut analysis = Self::degraded(&ColumnDescriptor::new(column_name, "Utf8"));
        analysis.category = category;
        analysis
    }

    pub fn is_degraded(&self) -> bool {
        self.category == ColumnCategory::Unknown
    }
}

/// Raw values of one statistics row.
#[derive(Debug, Clone, Default)]
struct RawStats {
    cardinality: u64,
    null_count: u64,
    native_type: Option<String>,
    min: Option<f64>,
    max: Option<f64>,
    std_dev: Option<f64>,
    zero_count: Option<u64>,
}

/// Builder for [`ColumnProfiler`].
pub struct ColumnProfilerBuilder {
    config: ProfilerConfig,
}

impl ColumnProfilerBuilder {
    /// Set the number of distinct values sampled per column
    pub fn sample_limit(mut self, limit: usize) -> Self {
        self.config.sample_limit = limit;
        self
    }

    /// Set the share of samples a value pattern must match
    pub fn pattern_threshold(mut self, threshold: f64) -> Self {
        self.config.pattern_threshold = threshold;
        self
    }

    pub fn identifier_uniqueness(mut self, uniqueness: f64) -> Self {
        self.config.identifier_uniqueness = uniqueness;
        self
    }

    pub fn identifier_min_cardinality(mut self, cardinality: u64) -> Self {
        self.config.identifier_min_cardinality = cardinality;
        self
    }

    pub fn categorical_ratio(mut self, ratio: f64) -> Self {
        self.config.categorical_ratio = ratio;
        self
    }

    pub fn categorical_max_cardinality(mut self, cardinality: u64) -> Self {
        self.config.categorical_max_cardinality = cardinality;
        self
    }

    /// Enable or disable the one-statement-per-query-kind mode
    pub fn batched(mut self, batched: bool) -> Self {
        self.config.batched = batched;
        self
    }

    pub fn build(self) -> ColumnProfiler {
        ColumnProfiler {
            config: self.config,
        }
    }
}

/// Profiles the columns of loaded tables.
#[derive(Debug, Clone)]
pub struct ColumnProfiler {
    config: ProfilerConfig,
}

impl ColumnProfiler {
    pub fn builder() -> ColumnProfilerBuilder {
        ColumnProfilerBuilder {
            config: ProfilerConfig::default(),
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Profiles every column of a table, in column order.
    ///
    /// Only table-level failures (no data loaded, row count query failing)
    /// are returned as errors.
    #[instrument(skip(self, engine, table, options), fields(table = %table.display_name, columns = table.columns.len()))]
    pub async fn profile_table(
        &self,
        engine: &dyn QueryEngine,
        table: &TableHandle,
        options: &ProfileOptions,
    ) -> Result<Vec<ColumnAnalysis>> {
        let start_time = std::time::Instant::now();
        let table_ref = Self::table_ref(table)?;
        let columns = &table.columns;
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let row_count = async {
            match options.row_count {
                Some(rows) => Ok(rows),
                None => self.count_rows(engine, &table_ref).await,
            }
        };
        let (row_count, mut stats, mut samples) = tokio::join!(
            row_count,
            self.collect_stats(engine, &table_ref, columns),
            self.collect_samples(engine, &table_ref, columns),
        );
        let row_count = row_count?;

        let analyses: Vec<ColumnAnalysis> = columns
            .iter()
            .map(|column| {
                let column_stats = stats.remove(&column.name);
                let column_samples = samples.remove(&column.name);
                match (column_stats, column_samples) {
                    (Some(Ok(raw)), Some(Ok(values))) => {
                        self.analyze(table, column, raw, values, row_count, options)
                    }
                    (Some(Err(e)), _) | (_, Some(Err(e))) => {
                        warn!(column = %column.name, error = %e, "Column analysis degraded");
                        ColumnAnalysis::degraded(column)
                    }
                    _ => {
                        warn!(column = %column.name, "Column missing from profiling results");
                        ColumnAnalysis::degraded(column)
                    }
                }
            })
            .collect();

        info!(
            rows = row_count,
            degraded = analyses.iter().filter(|a| a.is_degraded()).count(),
            time_ms = start_time.elapsed().as_millis() as u64,
            "Completed table profiling"
        );
        Ok(analyses)
    }

    /// Profiles a single column; failures are returned instead of degraded.
    #[instrument(skip(self, engine, table, options), fields(table = %table.display_name))]
    pub async fn profile_column(
        &self,
        engine: &dyn QueryEngine,
        table: &TableHandle,
        column_name: &str,
        options: &ProfileOptions,
    ) -> Result<ColumnAnalysis> {
        let table_ref = Self::table_ref(table)?;
        let column = table
            .column(column_name)
            .ok_or_else(|| InsightError::analysis(column_name, "column not found on table"))?;

        let row_count = async {
            match options.row_count {
                Some(rows) => Ok(rows),
                None => self.count_rows(engine, &table_ref).await,
            }
        };
        let (row_count, raw, values) = tokio::join!(
            row_count,
            self.column_stats(engine, &table_ref, column),
            self.column_samples(engine, &table_ref, column),
        );

        let to_analysis_error = |e: InsightError| match e {
            e @ InsightError::Analysis { .. } => e,
            other => InsightError::analysis(column_name, other.to_string()),
        };
        let row_count = row_count.map_err(to_analysis_error)?;
        let raw = raw.map_err(to_analysis_error)?;
        let values = values.map_err(to_analysis_error)?;

        Ok(self.analyze(table, column, raw, values, row_count, options))
    }

    fn table_ref(table: &TableHandle) -> Result<String> {
        let engine_name = table
            .engine_name()
            .ok_or_else(|| InsightError::table_not_loaded(&table.display_name))?;
        Ok(SqlFormatter::quote_identifier(engine_name))
    }

    fn analyze(
        &self,
        table: &TableHandle,
        column: &ColumnDescriptor,
        raw: RawStats,
        samples: Vec<String>,
        row_count: u64,
        options: &ProfileOptions,
    ) -> ColumnAnalysis {
        let native_type = raw
            .native_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| column.native_type.clone());
        let uniqueness = uniqueness(raw.cardinality, row_count);
        let hint = options.hint_for(table, &column.name);

        let category = classify(
            &ColumnEvidence {
                name: &column.name,
                native_type: &native_type,
                cardinality: raw.cardinality,
                row_count,
                uniqueness,
                samples: &samples,
                is_identifier_hint: hint.is_some_and(|h| h.is_identifier_hint),
                is_reference_hint: hint.is_some_and(|h| h.is_reference_hint),
            },
            &self.config,
        );
        debug!(column = %column.name, %category, cardinality = raw.cardinality, "Classified column");

        let numeric = NativeTypeClass::from_type_name(&native_type) == NativeTypeClass::Numeric;
        ColumnAnalysis {
            column_name: column.name.clone(),
            native_type,
            category,
            cardinality: raw.cardinality,
            uniqueness,
            null_count: raw.null_count,
            sample_values: samples,
            min: raw.min.filter(|_| numeric),
            max: raw.max.filter(|_| numeric),
            std_dev: raw.std_dev.filter(|_| numeric),
            zero_count: raw.zero_count.filter(|_| numeric),
        }
    }

    async fn count_rows(&self, engine: &dyn QueryEngine, table_ref: &str) -> Result<u64> {
        let batches = engine
            .query(&format!("SELECT COUNT(*) AS row_count FROM {table_ref}"))
            .await?;
        let batch = batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .ok_or_else(|| InsightError::Internal("row count query returned no rows".to_string()))?;
        let counts = int64_column(batch, "row_count")?;
        Ok(counts.value(0).max(0) as u64)
    }

    async fn collect_stats(
        &self,
        engine: &dyn QueryEngine,
        table_ref: &str,
        columns: &[ColumnDescriptor],
    ) -> HashMap<String, Result<RawStats>> {
        if self.config.batched {
            let sql = columns
                .iter()
                .map(|c| stats_branch(table_ref, c))
                .collect::<Vec<_>>()
                .join(" UNION ALL ");
            let parsed = match engine.query(&sql).await {
                Ok(batches) => parse_stats(&batches),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(mut parsed) => {
                    return columns
                        .iter()
                        .map(|c| {
                            let result = parsed.remove(&c.name).ok_or_else(|| {
                                InsightError::analysis(&c.name, "missing from statistics result")
                            });
                            (c.name.clone(), result)
                        })
                        .collect();
                }
                Err(e) => {
                    warn!(error = %e, "Batched statistics query failed, retrying per column");
                }
            }
        }

        let mut results = HashMap::with_capacity(columns.len());
        for column in columns {
            let result = self.column_stats(engine, table_ref, column).await;
            results.insert(column.name.clone(), result);
        }
        results
    }

    async fn column_stats(
        &self,
        engine: &dyn QueryEngine,
        table_ref: &str,
        column: &ColumnDescriptor,
    ) -> Result<RawStats> {
        let batches = engine.query(&stats_branch(table_ref, column)).await?;
        parse_stats(&batches)?
            .remove(&column.name)
            .ok_or_else(|| InsightError::analysis(&column.name, "missing from statistics result"))
    }

    async fn collect_samples(
        &self,
        engine: &dyn QueryEngine,
        table_ref: &str,
        columns: &[ColumnDescriptor],
    ) -> HashMap<String, Result<Vec<String>>> {
        if self.config.batched {
            let sql = columns
                .iter()
                .enumerate()
                .map(|(i, c)| self.samples_branch(table_ref, c, i))
                .collect::<Vec<_>>()
                .join(" UNION ALL ");
            let parsed = match engine.query(&sql).await {
                Ok(batches) => parse_samples(&batches),
                Err(e) => Err(e),
            };
            match parsed {
                // all-null columns have no sample rows at all
                Ok(mut parsed) => {
                    return columns
                        .iter()
                        .map(|c| (c.name.clone(), Ok(parsed.remove(&c.name).unwrap_or_default())))
                        .collect();
                }
                Err(e) => {
                    warn!(error = %e, "Batched samples query failed, retrying per column");
                }
            }
        }

        let mut results = HashMap::with_capacity(columns.len());
        for column in columns {
            let result = self.column_samples(engine, table_ref, column).await;
            results.insert(column.name.clone(), result);
        }
        results
    }

    async fn column_samples(
        &self,
        engine: &dyn QueryEngine,
        table_ref: &str,
        column: &ColumnDescriptor,
    ) -> Result<Vec<String>> {
        let batches = engine
            .query(&self.samples_branch(table_ref, column, 0))
            .await?;
        Ok(parse_samples(&batches)?
            .remove(&column.name)
            .unwrap_or_default())
    }

    fn samples_branch(&self, table_ref: &str, column: &ColumnDescriptor, index: usize) -> String {
        let col = SqlFormatter::quote_identifier(&column.name);
        format!(
            "SELECT {name} AS column_name, CAST(sample AS VARCHAR) AS sample_value \
             FROM (SELECT DISTINCT {col} AS sample FROM {table_ref} WHERE {col} IS NOT NULL LIMIT {limit}) AS s{index}",
            name = SqlFormatter::quote_string(&column.name),
            limit = self.config.sample_limit,
        )
    }
}

impl Default for ColumnProfiler {
    fn default() -> Self {
        Self::new()
    }
}

fn uniqueness(cardinality: u64, row_count: u64) -> f64 {
    if row_count == 0 {
        return 0.0;
    }
    (cardinality as f64 / row_count as f64).clamp(0.0, 1.0)
}

/// One `UNION ALL` branch of the statistics statement.
fn stats_branch(table_ref: &str, column: &ColumnDescriptor) -> String {
    let col = SqlFormatter::quote_identifier(&column.name);
    let numeric = match NativeTypeClass::from_type_name(&column.native_type) {
        NativeTypeClass::Numeric | NativeTypeClass::String => format!("TRY_CAST({col} AS DOUBLE)"),
        _ => "CAST(NULL AS DOUBLE)".to_string(),
    };
    format!(
        "SELECT {name} AS column_name, \
         COUNT(DISTINCT {col}) AS cardinality, \
         COUNT(*) - COUNT({col}) AS null_count, \
         MIN(arrow_typeof({col})) AS native_type, \
         MIN({numeric}) AS min_value, \
         MAX({numeric}) AS max_value, \
         STDDEV({numeric}) AS std_dev, \
         SUM(CASE WHEN {numeric} = 0 THEN 1 ELSE 0 END) AS zero_count \
         FROM {table_ref}",
        name = SqlFormatter::quote_string(&column.name),
    )
}

fn column_by_name<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| InsightError::Internal(format!("result has no '{name}' column")))
}

fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let array = cast(column_by_name(batch, name)?, &DataType::Utf8)?;
    array
        .as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| InsightError::Internal(format!("expected strings in '{name}'")))
}

fn int64_column(batch: &RecordBatch, name: &str) -> Result<Int64Array> {
    let array = cast(column_by_name(batch, name)?, &DataType::Int64)?;
    array
        .as_any()
        .downcast_ref::<Int64Array>()
        .cloned()
        .ok_or_else(|| InsightError::Internal(format!("expected integers in '{name}'")))
}

fn float64_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let array = cast(column_by_name(batch, name)?, &DataType::Float64)?;
    array
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| InsightError::Internal(format!("expected floats in '{name}'")))
}

fn optional_f64(array: &Float64Array, row: usize) -> Option<f64> {
    (!array.is_null(row))
        .then(|| array.value(row))
        .filter(|v| v.is_finite())
}

fn optional_u64(array: &Int64Array, row: usize) -> Option<u64> {
    (!array.is_null(row)).then(|| array.value(row).max(0) as u64)
}

fn parse_stats(batches: &[RecordBatch]) -> Result<HashMap<String, RawStats>> {
    let mut stats = HashMap::new();
    for batch in batches.iter().filter(|b| b.num_rows() > 0) {
        let names = string_column(batch, "column_name")?;
        let cardinality = int64_column(batch, "cardinality")?;
        let null_count = int64_column(batch, "null_count")?;
        let native_type = string_column(batch, "native_type")?;
        let min = float64_column(batch, "min_value")?;
        let max = float64_column(batch, "max_value")?;
        let std_dev = float64_column(batch, "std_dev")?;
        let zero_count = int64_column(batch, "zero_count")?;

        for row in 0..batch.num_rows() {
            if names.is_null(row) {
                continue;
            }
            stats.insert(
                names.value(row).to_string(),
                RawStats {
                    cardinality: optional_u64(&cardinality, row).unwrap_or(0),
                    null_count: optional_u64(&null_count, row).unwrap_or(0),
                    native_type: (!native_type.is_null(row))
                        .then(|| native_type.value(row).to_string()),
                    min: optional_f64(&min, row),
                    max: optional_f64(&max, row),
                    std_dev: optional_f64(&std_dev, row),
                    zero_count: optional_u64(&zero_count, row),
                },
            );
        }
    }
    Ok(stats)
}

fn parse_samples(batches: &[RecordBatch]) -> Result<HashMap<String, Vec<String>>> {
    let mut samples: HashMap<String, Vec<String>> = HashMap::new();
    for batch in batches.iter().filter(|b| b.num_rows() > 0) {
        let names = string_column(batch, "column_name")?;
        let values = string_column(batch, "sample_value")?;
        for row in 0..batch.num_rows() {
            if names.is_null(row) || values.is_null(row) {
                continue;
            }
            samples
                .entry(names.value(row).to_string())
                .or_default()
                .push(values.value(row).to_string());
        }
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DataFusionEngine, EngineConfig};
    use arrow::array::BooleanArray;
    use arrow::datatypes::{Field, Schema};
    use async_trait::async_trait;
    use std::sync::Arc;

    fn engine() -> DataFusionEngine {
        DataFusionEngine::with_config(EngineConfig::lightweight()).unwrap()
    }

    fn people(engine: &DataFusionEngine) -> TableHandle {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("email", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
            Field::new("active", DataType::Boolean, true),
            Field::new("team", DataType::Utf8, true),
            Field::new("notes", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5])),
                Arc::new(StringArray::from(vec![
                    Some("ann@example.com"),
                    Some("bo@example.com"),
                    Some("cy@example.org"),
                    Some("di@example.net"),
                    None,
                ])),
                Arc::new(Float64Array::from(vec![Some(0.0), Some(2.5), Some(5.0), None, Some(0.0)])),
                Arc::new(BooleanArray::from(vec![true, false, true, true, false])),
                Arc::new(StringArray::from(vec!["red", "red", "blue", "red", "blue"])),
                Arc::new(StringArray::from(vec![None::<&str>, None, None, None, None])),
            ],
        )
        .unwrap();
        engine.register_batches("People", vec![batch]).unwrap()
    }

    fn by_name<'a>(analyses: &'a [ColumnAnalysis], name: &str) -> &'a ColumnAnalysis {
        analyses.iter().find(|a| a.column_name == name).unwrap()
    }

    #[test]
    fn test_profiler_config_builder() {
        let profiler = ColumnProfiler::builder()
            .sample_limit(3)
            .pattern_threshold(0.9)
            .identifier_uniqueness(0.99)
            .identifier_min_cardinality(100)
            .categorical_ratio(0.1)
            .categorical_max_cardinality(20)
            .batched(false)
            .build();

        assert_eq!(profiler.config().sample_limit, 3);
        assert_eq!(profiler.config().pattern_threshold, 0.9);
        assert_eq!(profiler.config().identifier_uniqueness, 0.99);
        assert_eq!(profiler.config().identifier_min_cardinality, 100);
        assert_eq!(profiler.config().categorical_ratio, 0.1);
        assert_eq!(profiler.config().categorical_max_cardinality, 20);
        assert!(!profiler.config().batched);
    }

    #[test]
    fn test_uniqueness_is_bounded() {
        assert_eq!(uniqueness(0, 0), 0.0);
        assert_eq!(uniqueness(5, 10), 0.5);
        assert_eq!(uniqueness(12, 10), 1.0);
    }

    #[test]
    fn test_stats_branch_shape() {
        let sql = stats_branch("\"t1\"", &ColumnDescriptor::new("it's", "Int64"));
        assert!(sql.starts_with("SELECT 'it''s' AS column_name, COUNT(DISTINCT \"it's\")"));
        assert!(sql.contains("TRY_CAST(\"it's\" AS DOUBLE)"));

        let sql = stats_branch("\"t1\"", &ColumnDescriptor::new("at", "Date32"));
        assert!(sql.contains("MIN(CAST(NULL AS DOUBLE))"));
    }

    #[tokio::test]
    async fn test_profile_table() {
        let engine = engine();
        let table = people(&engine);
        let analyses = ColumnProfiler::new()
            .profile_table(&engine, &table, &ProfileOptions::default())
            .await
            .unwrap();

        assert_eq!(analyses.len(), 6);
        assert_eq!(analyses[0].column_name, "id");

        let id = by_name(&analyses, "id");
        assert_eq!(id.category, ColumnCategory::Identifier);
        assert_eq!(id.cardinality, 5);
        assert_eq!(id.uniqueness, 1.0);
        assert_eq!(id.min, Some(1.0));
        assert_eq!(id.max, Some(5.0));

        let email = by_name(&analyses, "email");
        assert_eq!(email.category, ColumnCategory::Email);
        assert_eq!(email.null_count, 1);
        assert_eq!(email.sample_values.len(), 4);
        assert_eq!(email.min, None);

        let score = by_name(&analyses, "score");
        assert_eq!(score.category, ColumnCategory::Numerical);
        assert_eq!(score.zero_count, Some(2));
        assert_eq!(score.max, Some(5.0));

        assert_eq!(by_name(&analyses, "active").category, ColumnCategory::Boolean);
        assert_eq!(by_name(&analyses, "team").category, ColumnCategory::Categorical);

        let notes = by_name(&analyses, "notes");
        assert_eq!(notes.null_count, 5);
        assert!(notes.sample_values.is_empty());
        assert!(!notes.is_degraded());
    }

    #[tokio::test]
    async fn test_known_row_count_and_hints() {
        let engine = engine();
        let table = people(&engine);
        let hint = FieldDescriptor::column(
            "f_team",
            table.id.clone(),
            "team",
            crate::model::FieldType::String,
        )
        .reference();
        let options = ProfileOptions::default()
            .with_row_count(5)
            .with_hints(vec![hint]);

        let analyses = ColumnProfiler::new()
            .profile_table(&engine, &table, &options)
            .await
            .unwrap();
        assert_eq!(by_name(&analyses, "team").category, ColumnCategory::Reference);
    }

    #[tokio::test]
    async fn test_per_column_mode_matches_batched() {
        let engine = engine();
        let table = people(&engine);
        let options = ProfileOptions::default();

        let batched = ColumnProfiler::new()
            .profile_table(&engine, &table, &options)
            .await
            .unwrap();
        let per_column = ColumnProfiler::builder()
            .batched(false)
            .build()
            .profile_table(&engine, &table, &options)
            .await
            .unwrap();

        for (a, b) in batched.iter().zip(&per_column) {
            assert_eq!(a.column_name, b.column_name);
            assert_eq!(a.category, b.category);
            assert_eq!(a.cardinality, b.cardinality);
            assert_eq!(a.null_count, b.null_count);
        }
    }

    #[tokio::test]
    async fn test_missing_column_degrades_only_itself() {
        let engine = engine();
        let mut table = people(&engine);
        table.columns.push(ColumnDescriptor::new("ghost", "Utf8"));

        let analyses = ColumnProfiler::new()
            .profile_table(&engine, &table, &ProfileOptions::default())
            .await
            .unwrap();

        let ghost = by_name(&analyses, "ghost");
        assert_eq!(ghost.category, ColumnCategory::Unknown);
        assert_eq!(ghost.cardinality, 0);
        assert_eq!(by_name(&analyses, "email").category, ColumnCategory::Email);
    }

    #[tokio::test]
    async fn test_profile_column_surfaces_errors() {
        let engine = engine();
        let table = people(&engine);
        let profiler = ColumnProfiler::new();

        let team = profiler
            .profile_column(&engine, &table, "team", &ProfileOptions::default())
            .await
            .unwrap();
        assert_eq!(team.category, ColumnCategory::Categorical);
        assert_eq!(team.cardinality, 2);

        let err = profiler
            .profile_column(&engine, &table, "ghost", &ProfileOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::Analysis { .. }));
    }

    #[tokio::test]
    async fn test_unloaded_table_is_rejected() {
        let engine = engine();
        let table = TableHandle::unloaded("t", "Pending");
        let err = ColumnProfiler::new()
            .profile_table(&engine, &table, &ProfileOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::TableNotLoaded { .. }));
    }

    /// Engine that counts round trips.
    struct CountingEngine {
        inner: DataFusionEngine,
        queries: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl QueryEngine for CountingEngine {
        async fn query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
            self.queries
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.query(sql).await
        }

        fn has_table(&self, name: &str) -> bool {
            self.inner.has_table(name)
        }
    }

    #[tokio::test]
    async fn test_two_round_trips_with_known_row_count() {
        let inner = engine();
        let table = people(&inner);
        let engine = CountingEngine {
            inner,
            queries: Default::default(),
        };

        ColumnProfiler::new()
            .profile_table(&engine, &table, &ProfileOptions::default().with_row_count(5))
            .await
            .unwrap();
        assert_eq!(engine.queries.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
