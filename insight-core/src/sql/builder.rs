//! Single-table query plans.
//!
//! A [`QueryPlan`] is an immutable value: every builder method consumes the
//! plan and returns a new one. `filter` accumulates (predicates are ANDed with
//! earlier ones) while `select`, `sort`, `group_by`, `limit` and `offset`
//! replace whatever an earlier call of the same kind set.
//!
//! # Example
//!
//! ```rust
//! use insight_core::model::{FilterPredicate, SortSpec};
//! use insight_core::sql::QueryPlan;
//!
//! let sql = QueryPlan::new("users")
//!     .select(["name", "email"])
//!     .filter([FilterPredicate::is_not_null("email")])
//!     .sort([SortSpec::asc("name")])
//!     .limit(20)
//!     .sql();
//!
//! assert_eq!(
//!     sql,
//!     "SELECT \"name\", \"email\" FROM \"users\" WHERE \"email\" IS NOT NULL ORDER BY \"name\" ASC LIMIT 20"
//! );
//! ```

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::format::SqlFormatter;
use crate::engine::QueryEngine;
use crate::error::Result;
use crate::model::{AggregateFunction, FilterPredicate, SortSpec};

/// An aggregate expression in a grouped plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aggregation {
    function: AggregateFunction,
    column: Option<String>,
    alias: Option<String>,
}

impl Aggregation {
    /// `COUNT(*)`.
    pub fn count_all() -> Self {
        Self {
            function: AggregateFunction::Count,
            column: None,
            alias: None,
        }
    }

    /// An aggregation over a column.
    pub fn of(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            function,
            column: Some(column.into()),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn function(&self) -> AggregateFunction {
        self.function
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Renders the expression, with `AS "alias"` when an alias is set.
    pub fn to_sql(&self) -> String {
        let column_ref = self.column.as_deref().map(SqlFormatter::quote_identifier);
        let expr = render_aggregate(self.function, column_ref);
        match &self.alias {
            Some(alias) => format!("{expr} AS {}", SqlFormatter::quote_identifier(alias)),
            None => expr,
        }
    }
}

/// Renders an aggregate call over an already rendered column reference.
///
/// A missing column always means `COUNT(*)`.
pub(crate) fn render_aggregate(function: AggregateFunction, column_ref: Option<String>) -> String {
    match (function, column_ref) {
        (AggregateFunction::CountDistinct, Some(col)) => format!("COUNT(DISTINCT {col})"),
        (function, Some(col)) => format!("{}({col})", function.sql_name()),
        (_, None) => "COUNT(*)".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
struct GroupBy {
    columns: Vec<String>,
    aggregations: Vec<Aggregation>,
}

/// Immutable accumulator of operations against one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    table: String,
    select: Option<Vec<String>>,
    filters: Vec<FilterPredicate>,
    sort: Option<Vec<SortSpec>>,
    group_by: Option<GroupBy>,
    limit: Option<u64>,
    offset: Option<u64>,
}

/// The fluent name callers coming from builder-style APIs look for.
pub type QueryBuilder = QueryPlan;

impl QueryPlan {
    /// Creates an empty plan over `table` (the engine's table name).
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: None,
            filters: Vec::new(),
            sort: None,
            group_by: None,
            limit: None,
            offset: None,
        }
    }

    /// Replaces the projected columns.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Appends predicates; they are ANDed with any earlier ones.
    pub fn filter<I>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = FilterPredicate>,
    {
        self.filters.extend(predicates);
        self
    }

    /// Replaces the sort order.
    pub fn sort<I>(mut self, orders: I) -> Self
    where
        I: IntoIterator<Item = SortSpec>,
    {
        self.sort = Some(orders.into_iter().collect());
        self
    }

    /// Replaces the grouping columns and their aggregations.
    pub fn group_by<I, S, A>(mut self, columns: I, aggregations: A) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        A: IntoIterator<Item = Aggregation>,
    {
        self.group_by = Some(GroupBy {
            columns: columns.into_iter().map(Into::into).collect(),
            aggregations: aggregations.into_iter().collect(),
        });
        self
    }

    /// Replaces the row limit. `0` is a real limit, not "unset".
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Replaces the row offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filters(&self) -> &[FilterPredicate] {
        &self.filters
    }

    pub fn sort_orders(&self) -> Option<&[SortSpec]> {
        self.sort.as_deref()
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn get_offset(&self) -> Option<u64> {
        self.offset
    }

    fn select_clause(&self) -> String {
        let mut items: Vec<String> = Vec::new();
        if let Some(group) = &self.group_by {
            items.extend(group.aggregations.iter().map(Aggregation::to_sql));
            items.extend(group.columns.iter().map(|c| SqlFormatter::quote_identifier(c)));
        }
        if items.is_empty() {
            if let Some(select) = &self.select {
                items.extend(select.iter().map(|c| SqlFormatter::quote_identifier(c)));
            }
        }
        if items.is_empty() {
            "*".to_string()
        } else {
            items.join(", ")
        }
    }

    /// Compiles the plan to a single statement.
    ///
    /// Clause order is fixed: `SELECT … FROM … WHERE … GROUP BY … ORDER BY …
    /// LIMIT … OFFSET`, and each optional clause appears only when set.
    pub fn sql(&self) -> String {
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.select_clause(),
            SqlFormatter::quote_identifier(&self.table)
        );

        if let Some(where_clause) = SqlFormatter::format_predicates(&self.filters) {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }

        if let Some(group) = self.group_by.as_ref().filter(|g| !g.columns.is_empty()) {
            let columns = group
                .columns
                .iter()
                .map(|c| SqlFormatter::quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" GROUP BY ");
            sql.push_str(&columns);
        }

        if let Some(order_by) = render_order_by(self.sort.as_deref().unwrap_or_default()) {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by);
        }

        push_pagination(&mut sql, self.limit, self.offset);
        sql
    }

    /// Alias of [`QueryPlan::sql`].
    pub fn to_sql(&self) -> String {
        self.sql()
    }

    /// Compiles and runs the plan against an engine.
    #[instrument(skip(self, engine), fields(table = %self.table))]
    pub async fn execute(&self, engine: &dyn QueryEngine) -> Result<Vec<RecordBatch>> {
        engine.query(&self.sql()).await
    }
}

/// Renders `"col" ASC, "other" DESC`; `None` for an empty list.
pub(crate) fn render_order_by(orders: &[SortSpec]) -> Option<String> {
    if orders.is_empty() {
        return None;
    }
    Some(
        orders
            .iter()
            .map(|o| {
                format!(
                    "{} {}",
                    SqlFormatter::quote_identifier(&o.column_name),
                    o.direction.as_sql()
                )
            })
            .collect::<Vec<_>>()
            .join(", "),
    )
}

pub(crate) fn push_pagination(sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }
}
