//! Compilation of [`InsightSpec`]s into a single SQL statement.
//!
//! The join construction is always compiled into an inner projection that is
//! wrapped as a subquery:
//!
//! ```text
//! SELECT * FROM (
//!     SELECT base."name", j."value" AS "Orders.value", ...
//!     FROM "users" AS base LEFT JOIN "orders" AS j ON base."id" = j."user_id"
//! ) AS insight WHERE ... ORDER BY ... LIMIT ... OFFSET ...
//! ```
//!
//! Column names projected by more than one table are aliased
//! `"<table display name>.<column>"`, except the base-side join key which
//! keeps its bare name. Filters and sorts then address the subquery's output
//! names. When the insight has metrics the outer query aggregates instead of
//! `SELECT *` and groups on every dimension.
//!
//! # Example
//!
//! ```rust
//! use insight_core::model::*;
//! use insight_core::sql::InsightCompiler;
//!
//! let users = TableHandle::loaded("users", "Users", "users", vec![
//!     ColumnDescriptor::new("id", "Int64"),
//!     ColumnDescriptor::new("name", "Utf8"),
//! ]);
//! let orders = TableHandle::loaded("orders", "Orders", "orders", vec![
//!     ColumnDescriptor::new("user_id", "Int64"),
//!     ColumnDescriptor::new("amount", "Float64"),
//! ]);
//! let fields: FieldCatalog = vec![
//!     FieldDescriptor::column("users.id", "users", "id", FieldType::Number),
//!     FieldDescriptor::column("users.name", "users", "name", FieldType::String),
//!     FieldDescriptor::column("orders.user_id", "orders", "user_id", FieldType::Number),
//! ].into_iter().collect();
//!
//! let spec = InsightSpec::new(users)
//!     .select(["users.name"])
//!     .join(JoinSpec::new(orders, "users.id", "orders.user_id", JoinType::Left))
//!     .metric(MetricSpec::new("m1", "Total", "orders", AggregateFunction::Sum, Some("amount")));
//!
//! let sql = InsightCompiler::new().compile(&spec, &fields).unwrap();
//! assert!(sql.starts_with("SELECT SUM(\"amount\") AS \"Total\", \"name\" FROM"));
//! assert!(sql.ends_with("GROUP BY \"name\""));
//! ```

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use super::builder::{push_pagination, render_aggregate, render_order_by};
use super::format::SqlFormatter;
use super::naming::display_name;
use crate::error::{InsightError, Result};
use crate::logging::{truncate_field, LogConfig};
use crate::model::{FieldResolver, InsightSpec, TableHandle};

/// Aliases used in compiled statements.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Alias of the base table
    pub base_alias: String,
    /// Alias prefix of joined tables: `j`, `j2`, `j3`, ...
    pub join_alias_prefix: String,
    /// Alias of the wrapped join subquery
    pub subquery_alias: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            base_alias: "base".to_string(),
            join_alias_prefix: "j".to_string(),
            subquery_alias: "insight".to_string(),
        }
    }
}

/// A table taking part in the statement.
struct Source<'a> {
    alias: String,
    label: String,
    engine_name: &'a str,
    table: &'a TableHandle,
}

struct JoinClause {
    keyword: &'static str,
    target: usize,
    base_side: usize,
    base_column: String,
    target_column: String,
}

/// A physical column projected by the inner query.
struct Projected {
    source: usize,
    column: String,
    output: String,
}

/// Everything but the outer clauses.
struct InsightPlan {
    from_subquery: String,
    select_list: String,
    group_by: Option<String>,
}

/// Compiles insight specifications into SQL.
#[derive(Debug, Clone, Default)]
pub struct InsightCompiler {
    config: CompilerConfig,
    log_config: LogConfig,
}

impl InsightCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        Self {
            config,
            log_config: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles the insight into one executable statement.
    ///
    /// Metrics group on every selected dimension. With metrics but no
    /// dimensions no `GROUP BY` is emitted and the insight yields one global
    /// aggregate row.
    ///
    /// Fails without producing any SQL when a join key cannot be resolved, a
    /// table has no data loaded, or a metric is malformed.
    #[instrument(skip(self, spec, resolver), fields(
        base = %spec.base_table.display_name,
        joins = spec.joins.len(),
        metrics = spec.metrics.len()
    ))]
    pub fn compile(&self, spec: &InsightSpec, resolver: &dyn FieldResolver) -> Result<String> {
        let plan = self.plan(spec, resolver)?;
        crate::perf_debug!(
            self.log_config,
            grouped = plan.group_by.is_some(),
            "Planned insight"
        );
        let sql = self.render(spec, &plan, true);

        crate::log_sql!(
            self.log_config,
            sql = %truncate_field(&sql, self.log_config.max_field_length),
            "Compiled insight"
        );
        Ok(sql)
    }

    /// Compiles a statement counting every row the insight yields, ignoring
    /// `limit` and `offset`.
    #[instrument(skip(self, spec, resolver), fields(base = %spec.base_table.display_name))]
    pub fn compile_count(&self, spec: &InsightSpec, resolver: &dyn FieldResolver) -> Result<String> {
        let plan = self.plan(spec, resolver)?;
        let inner = self.render(spec, &plan, false);
        Ok(format!(
            "SELECT COUNT(*) AS \"total_rows\" FROM ({inner}) AS {}_count",
            self.config.subquery_alias
        ))
    }

    fn alias_for(&self, index: usize) -> String {
        match index {
            0 => self.config.base_alias.clone(),
            1 => self.config.join_alias_prefix.clone(),
            n => format!("{}{n}", self.config.join_alias_prefix),
        }
    }

    fn sources<'a>(&self, spec: &'a InsightSpec) -> Result<Vec<Source<'a>>> {
        let mut labels = HashSet::new();
        let mut sources = Vec::with_capacity(spec.joins.len() + 1);

        for (index, table) in spec.tables().enumerate() {
            let engine_name = table
                .engine_name()
                .ok_or_else(|| InsightError::table_not_loaded(&table.display_name))?;
            SqlFormatter::validate_identifier(engine_name)?;

            let alias = self.alias_for(index);
            let mut label = display_name(&table.display_name);
            if !labels.insert(label.clone()) {
                label = format!("{label} ({alias})");
                labels.insert(label.clone());
            }

            sources.push(Source {
                alias,
                label,
                engine_name,
                table,
            });
        }
        Ok(sources)
    }

    fn source_of(sources: &[Source<'_>], table_id: &str) -> Option<usize> {
        sources.iter().position(|s| s.table.id == table_id)
    }

    fn join_clauses(
        spec: &InsightSpec,
        sources: &[Source<'_>],
        resolver: &dyn FieldResolver,
    ) -> Result<Vec<JoinClause>> {
        let mut clauses = Vec::with_capacity(spec.joins.len());

        for (i, join) in spec.joins.iter().enumerate() {
            let target = i + 1;
            let not_found = || {
                InsightError::join_key_not_found(
                    &join.target_table.display_name,
                    &join.join_on.base_field_id,
                    &join.join_on.target_field_id,
                )
            };

            let target_column = resolver
                .resolve(&join.join_on.target_field_id)
                .filter(|f| f.table_id == join.target_table.id)
                .and_then(|f| f.column_name.clone())
                .ok_or_else(not_found)?;

            // Chained joins may key on a column of an earlier join target.
            let (base_side, base_column) = resolver
                .resolve(&join.join_on.base_field_id)
                .and_then(|f| {
                    let side = Self::source_of(&sources[..target], &f.table_id)?;
                    f.column_name.as_deref().map(|c| (side, c))
                })
                .ok_or_else(not_found)?;

            clauses.push(JoinClause {
                keyword: join.join_type.to_sql(),
                target,
                base_side,
                base_column: base_column.to_string(),
                target_column,
            });
        }
        Ok(clauses)
    }

    fn plan(&self, spec: &InsightSpec, resolver: &dyn FieldResolver) -> Result<InsightPlan> {
        let sources = self.sources(spec)?;
        let joins = Self::join_clauses(spec, &sources, resolver)?;

        let mut projected: Vec<Projected> = Vec::new();
        let mut index: HashMap<(usize, String), usize> = HashMap::new();
        let mut add = |projected: &mut Vec<Projected>, source: usize, column: &str| -> usize {
            *index
                .entry((source, column.to_string()))
                .or_insert_with(|| {
                    projected.push(Projected {
                        source,
                        column: column.to_string(),
                        output: column.to_string(),
                    });
                    projected.len() - 1
                })
        };

        // Dimensions, in the order they were selected.
        let mut dimensions: Vec<usize> = Vec::new();
        let selected = spec
            .selected_fields
            .iter()
            .chain(spec.joins.iter().flat_map(|j| j.selected_fields.iter()));
        for field_id in selected {
            let field = resolver
                .resolve(field_id)
                .ok_or_else(|| InsightError::FieldNotFound {
                    field_id: field_id.clone(),
                })?;
            let Some(column) = field.column_name.as_deref() else {
                debug!(field = %field_id, "Skipping computed field");
                continue;
            };
            SqlFormatter::validate_identifier(column)?;
            let source = Self::source_of(&sources, &field.table_id).ok_or_else(|| {
                InsightError::UnknownTable {
                    table: field.table_id.clone(),
                }
            })?;
            let slot = add(&mut projected, source, column);
            if !dimensions.contains(&slot) {
                dimensions.push(slot);
            }
        }

        let aggregated = spec.is_aggregated();
        let mut metric_slots: Vec<Option<usize>> = Vec::with_capacity(spec.metrics.len());
        if aggregated {
            for metric in &spec.metrics {
                let source = Self::source_of(&sources, &metric.source_table).ok_or_else(|| {
                    InsightError::UnknownTable {
                        table: metric.source_table.clone(),
                    }
                })?;
                match metric.column_name.as_deref() {
                    Some(column) => {
                        SqlFormatter::validate_identifier(column)?;
                        let table = sources[source].table;
                        if !table.columns.is_empty() && !table.has_column(column) {
                            return Err(InsightError::invalid_metric(
                                &metric.display_name,
                                format!("column '{column}' not found on '{}'", table.display_name),
                            ));
                        }
                        metric_slots.push(Some(add(&mut projected, source, column)));
                    }
                    None if metric.aggregation.requires_column() => {
                        return Err(InsightError::invalid_metric(
                            &metric.display_name,
                            format!(
                                "{} aggregation requires a column",
                                metric.aggregation.sql_name()
                            ),
                        ));
                    }
                    None => metric_slots.push(None),
                }
            }
        } else {
            // Tables without an explicit selection contribute every column.
            for (source_idx, source) in sources.iter().enumerate() {
                if projected.iter().any(|p| p.source == source_idx) {
                    continue;
                }
                for column in &source.table.columns {
                    add(&mut projected, source_idx, &column.name);
                }
            }
        }

        resolve_collisions(&mut projected, &sources, &joins);

        let projection = if projected.is_empty() {
            "*".to_string()
        } else {
            projected
                .iter()
                .map(|p| {
                    let reference = SqlFormatter::qualified(&sources[p.source].alias, &p.column);
                    if p.output == p.column {
                        reference
                    } else {
                        format!("{reference} AS {}", SqlFormatter::quote_identifier(&p.output))
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut from_clause = format!(
            "{} AS {}",
            SqlFormatter::quote_identifier(sources[0].engine_name),
            sources[0].alias
        );
        for join in &joins {
            let target = &sources[join.target];
            from_clause.push_str(&format!(
                " {} {} AS {} ON {} = {}",
                join.keyword,
                SqlFormatter::quote_identifier(target.engine_name),
                target.alias,
                SqlFormatter::qualified(&sources[join.base_side].alias, &join.base_column),
                SqlFormatter::qualified(&target.alias, &join.target_column),
            ));
        }

        let from_subquery = format!(
            "(SELECT {projection} FROM {from_clause}) AS {}",
            self.config.subquery_alias
        );

        let dimension_refs: Vec<String> = dimensions
            .iter()
            .map(|&slot| SqlFormatter::quote_identifier(&projected[slot].output))
            .collect();

        if !aggregated {
            return Ok(InsightPlan {
                from_subquery,
                select_list: "*".to_string(),
                group_by: None,
            });
        }

        let mut select_items: Vec<String> = spec
            .metrics
            .iter()
            .zip(&metric_slots)
            .map(|(metric, slot)| {
                let column_ref =
                    slot.map(|s| SqlFormatter::quote_identifier(&projected[s].output));
                format!(
                    "{} AS {}",
                    render_aggregate(metric.aggregation, column_ref),
                    SqlFormatter::quote_identifier(&metric.display_name)
                )
            })
            .collect();
        select_items.extend(dimension_refs.iter().cloned());

        let group_by = if dimension_refs.is_empty() {
            None
        } else {
            Some(dimension_refs.join(", "))
        };

        Ok(InsightPlan {
            from_subquery,
            select_list: select_items.join(", "),
            group_by,
        })
    }

    fn render(&self, spec: &InsightSpec, plan: &InsightPlan, paginate: bool) -> String {
        let mut sql = format!("SELECT {} FROM {}", plan.select_list, plan.from_subquery);

        if let Some(where_clause) = SqlFormatter::format_predicates(&spec.filters) {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }
        if let Some(group_by) = &plan.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        if let Some(order_by) = render_order_by(&spec.sorts) {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by);
        }
        if paginate {
            push_pagination(&mut sql, spec.limit, spec.offset);
        }
        sql
    }
}

/// Aliases every column name projected by more than one table.
///
/// The base side of a join key keeps its bare name; its counterpart on the
/// joined side is still aliased.
fn resolve_collisions(projected: &mut [Projected], sources: &[Source<'_>], joins: &[JoinClause]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for p in projected.iter() {
        *counts.entry(p.column.clone()).or_default() += 1;
    }

    let exempt: HashSet<(usize, &str)> = joins
        .iter()
        .map(|j| (j.base_side, j.base_column.as_str()))
        .collect();

    let mut outputs: HashSet<String> = HashSet::new();
    for p in projected.iter_mut() {
        let collides = counts.get(&p.column).copied().unwrap_or(0) > 1;
        let keep_bare = !collides
            || (exempt.contains(&(p.source, p.column.as_str())) && !outputs.contains(&p.column));
        p.output = if keep_bare {
            p.column.clone()
        } else {
            format!("{}.{}", sources[p.source].label, p.column)
        };
        outputs.insert(p.output.clone());
    }
}
