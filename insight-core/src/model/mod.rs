//! Data model shared by the compiler, profiler and advisor.

pub mod insight;
pub mod table;
pub mod value;

pub use insight::{
    AggregateFunction, FilterOperator, FilterPredicate, InsightSpec, JoinOn, JoinSpec, JoinType,
    MetricSpec, SortDirection, SortSpec,
};
pub use table::{
    ColumnDescriptor, FieldCatalog, FieldDescriptor, FieldId, FieldResolver, FieldType,
    TableHandle, TableId,
};
pub use value::SqlValue;
