//! Declarative insight specifications and their building blocks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::table::{FieldId, TableHandle, TableId};
use super::value::SqlValue;
use crate::error::{InsightError, Result};

/// Comparison operator of a [`FilterPredicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
}

impl FilterOperator {
    /// SQL spelling of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::GtEq => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::LtEq => "<=",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT IN",
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, FilterOperator::In | FilterOperator::NotIn)
    }
}

impl FromStr for FilterOperator {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_uppercase().as_str() {
            "=" => Ok(FilterOperator::Eq),
            "!=" | "<>" => Ok(FilterOperator::NotEq),
            ">" => Ok(FilterOperator::Gt),
            ">=" => Ok(FilterOperator::GtEq),
            "<" => Ok(FilterOperator::Lt),
            "<=" => Ok(FilterOperator::LtEq),
            "IS NULL" => Ok(FilterOperator::IsNull),
            "IS NOT NULL" => Ok(FilterOperator::IsNotNull),
            "IN" => Ok(FilterOperator::In),
            "NOT IN" => Ok(FilterOperator::NotIn),
            other => Err(InsightError::Configuration(format!(
                "Unsupported filter operator '{other}'"
            ))),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A single `column <op> value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub column_name: String,
    pub operator: FilterOperator,
    pub value: Option<SqlValue>,
    /// Only used by `IN` / `NOT IN`
    pub values: Option<Vec<SqlValue>>,
}

impl FilterPredicate {
    /// Creates a binary comparison predicate.
    pub fn compare(
        column_name: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<SqlValue>,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            operator,
            value: Some(value.into()),
            values: None,
        }
    }

    pub fn eq(column_name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(column_name, FilterOperator::Eq, value)
    }

    pub fn is_null(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            operator: FilterOperator::IsNull,
            value: None,
            values: None,
        }
    }

    pub fn is_not_null(column_name: impl Into<String>) -> Self {
        Self {
            operator: FilterOperator::IsNotNull,
            ..Self::is_null(column_name)
        }
    }

    pub fn in_list<I, V>(column_name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Self {
            column_name: column_name.into(),
            operator: FilterOperator::In,
            value: None,
            values: Some(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn not_in_list<I, V>(column_name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Self {
            operator: FilterOperator::NotIn,
            ..Self::in_list(column_name, values)
        }
    }
}

/// Sort direction of a [`SortSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(InsightError::Configuration(format!(
                "Unsupported sort direction '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub column_name: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Aggregate function of a metric or grouped query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    CountDistinct,
}

impl AggregateFunction {
    /// SQL function name; `COUNT` for both count variants.
    pub fn sql_name(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count | AggregateFunction::CountDistinct => "COUNT",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }

    /// Whether the aggregation needs a column to operate on.
    pub fn requires_column(&self) -> bool {
        !matches!(self, AggregateFunction::Count)
    }
}

/// An aggregation projected by an aggregated insight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricSpec {
    pub id: String,
    pub display_name: String,
    pub source_table: TableId,
    pub column_name: Option<String>,
    pub aggregation: AggregateFunction,
}

impl MetricSpec {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        source_table: impl Into<TableId>,
        aggregation: AggregateFunction,
        column_name: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            source_table: source_table.into(),
            column_name: column_name.map(str::to_string),
            aggregation,
        }
    }
}

/// Join flavour of a [`JoinSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
}

impl JoinType {
    /// SQL join keyword for the columnar dialect.
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Outer => "FULL OUTER JOIN",
        }
    }
}

/// The field pair a join matches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinOn {
    pub base_field_id: FieldId,
    pub target_field_id: FieldId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinSpec {
    pub target_table: TableHandle,
    pub join_on: JoinOn,
    pub join_type: JoinType,
    /// Fields of the target table to project; empty projects every column
    pub selected_fields: Vec<FieldId>,
}

impl JoinSpec {
    pub fn new(
        target_table: TableHandle,
        base_field_id: impl Into<FieldId>,
        target_field_id: impl Into<FieldId>,
        join_type: JoinType,
    ) -> Self {
        Self {
            target_table,
            join_on: JoinOn {
                base_field_id: base_field_id.into(),
                target_field_id: target_field_id.into(),
            },
            join_type,
            selected_fields: Vec::new(),
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldId>,
    {
        self.selected_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// A complete declarative query over a base table and its joins.
///
/// A non-empty `metrics` list makes the insight aggregated: every projected
/// dimension is grouped on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSpec {
    pub base_table: TableHandle,
    /// Dimension fields; may belong to the base table or any join target
    pub selected_fields: Vec<FieldId>,
    pub joins: Vec<JoinSpec>,
    pub metrics: Vec<MetricSpec>,
    pub filters: Vec<FilterPredicate>,
    pub sorts: Vec<SortSpec>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl InsightSpec {
    pub fn new(base_table: TableHandle) -> Self {
        Self {
            base_table,
            selected_fields: Vec::new(),
            joins: Vec::new(),
            metrics: Vec::new(),
            filters: Vec::new(),
            sorts: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldId>,
    {
        self.selected_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    pub fn metric(mut self, metric: MetricSpec) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn filter(mut self, predicate: FilterPredicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sorts.push(sort);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn is_aggregated(&self) -> bool {
        !self.metrics.is_empty()
    }

    /// Every table the insight reads from, base table first.
    pub fn tables(&self) -> impl Iterator<Item = &TableHandle> {
        std::iter::once(&self.base_table).chain(self.joins.iter().map(|j| &j.target_table))
    }
}
