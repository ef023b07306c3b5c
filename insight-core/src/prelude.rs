//! Prelude for commonly used types and traits in insight-core.

pub use crate::analyzers::{
    suggest_join_columns, ColumnAnalysis, ColumnCategory, ColumnProfiler, Confidence,
    JoinAdvisor, JoinSuggestion, ProfileOptions,
};
pub use crate::cache::{CompiledSqlCache, SpecKey};
pub use crate::engine::{DataFusionEngine, EngineConfig, QueryEngine};
pub use crate::error::{ErrorContext, InsightError, Result};
pub use crate::logging::LogConfig;
pub use crate::model::{
    AggregateFunction, ColumnDescriptor, FieldCatalog, FieldDescriptor, FieldResolver, FieldType,
    FilterOperator, FilterPredicate, InsightSpec, JoinSpec, JoinType, MetricSpec, SortDirection,
    SortSpec, SqlValue, TableHandle,
};
pub use crate::runner::InsightRunner;
pub use crate::sql::{InsightCompiler, QueryBuilder, QueryPlan, SqlFormatter};
