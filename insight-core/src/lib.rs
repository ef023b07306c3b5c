//! # Insight Core - Declarative Analytics over DataFusion
//!
//! Insight Core turns declarative query specifications ("insights") into
//! injection-safe SQL for a columnar engine, and helps users pick join keys by
//! profiling the columns of loaded tables.
//!
//! ## Overview
//!
//! An [`InsightSpec`](model::InsightSpec) names a base table, the fields to
//! show, joins to other tables, aggregated metrics, filters, sorts and
//! pagination. The [`InsightCompiler`](sql::InsightCompiler) compiles it into
//! a single statement: joins are built in an aliased subquery, colliding
//! column names are disambiguated with the table's display name, and
//! aggregated insights group on every dimension.
//!
//! Independently, the [`ColumnProfiler`](analyzers::ColumnProfiler) computes
//! statistics, samples and a semantic category for each column, and the
//! [`JoinAdvisor`](analyzers::JoinAdvisor) ranks likely join key pairs between
//! two tables.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{Float64Array, Int64Array, StringArray};
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use insight_core::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let engine = Arc::new(DataFusionEngine::new()?);
//!
//! let users = RecordBatch::try_new(
//!     Arc::new(Schema::new(vec![
//!         Field::new("id", DataType::Int64, false),
//!         Field::new("name", DataType::Utf8, false),
//!     ])),
//!     vec![
//!         Arc::new(Int64Array::from(vec![1, 2])),
//!         Arc::new(StringArray::from(vec!["Ann", "Bo"])),
//!     ],
//! )?;
//! let orders = RecordBatch::try_new(
//!     Arc::new(Schema::new(vec![
//!         Field::new("user_id", DataType::Int64, false),
//!         Field::new("amount", DataType::Float64, false),
//!     ])),
//!     vec![
//!         Arc::new(Int64Array::from(vec![1, 1, 2])),
//!         Arc::new(Float64Array::from(vec![9.5, 0.5, 4.0])),
//!     ],
//! )?;
//! let users = engine.register_batches("users", vec![users])?;
//! let orders = engine.register_batches("orders", vec![orders])?;
//!
//! let fields: FieldCatalog = vec![
//!     FieldDescriptor::column("users.id", users.id.clone(), "id", FieldType::Number),
//!     FieldDescriptor::column("users.name", users.id.clone(), "name", FieldType::String),
//!     FieldDescriptor::column("orders.user_id", orders.id.clone(), "user_id", FieldType::Number),
//! ]
//! .into_iter()
//! .collect();
//!
//! let spec = InsightSpec::new(users.clone())
//!     .select(["users.name"])
//!     .join(JoinSpec::new(orders.clone(), "users.id", "orders.user_id", JoinType::Left))
//!     .metric(MetricSpec::new("m1", "Total", orders.id.clone(), AggregateFunction::Sum, Some("amount")))
//!     .sort(SortSpec::desc("Total"));
//!
//! let runner = InsightRunner::new(engine.clone());
//! let batches = runner.run(&spec, &fields).await?;
//! assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
//!
//! let suggestions = JoinAdvisor::new().advise(engine.as_ref(), &users, &orders).await?;
//! assert_eq!(suggestions[0].right_column, "user_id");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`model`]: tables, fields and the insight specification
//! - [`sql`]: value/predicate formatting, single-table query plans and the insight compiler
//! - [`engine`]: the [`QueryEngine`](engine::QueryEngine) boundary and its DataFusion implementation
//! - [`analyzers`]: column profiling, classification and join advice
//! - [`cache`] / [`runner`]: compiled statement caching and execution
//!
//! ## Logging
//!
//! The library emits `tracing` events and spans. Use
//! [`logging::setup::init_logging`] or install your own subscriber.

pub mod analyzers;
pub mod cache;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod prelude;
pub mod runner;
pub mod sql;
