//! Column profiling and join advice.
//!
//! ## Available Analyzers
//!
//! - **Column Profiler** (`profiler`): statistics and samples for every column
//!   of a table in two concurrent engine round trips
//! - **Classification** (`classify`): the cascade that turns statistics and
//!   samples into a [`ColumnCategory`]
//! - **Join Advisor** (`advisor`): ranked join key pairs between two tables
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use insight_core::analyzers::JoinAdvisor;
//! use insight_core::engine::DataFusionEngine;
//! # use insight_core::model::TableHandle;
//!
//! # async fn example(users: TableHandle, orders: TableHandle) -> insight_core::error::Result<()> {
//! let engine = DataFusionEngine::new()?;
//! let suggestions = JoinAdvisor::new().advise(&engine, &users, &orders).await?;
//! for s in suggestions {
//!     println!("{} = {} ({}): {}", s.left_column, s.right_column, s.confidence, s.reason);
//! }
//! # Ok(())
//! # }
//! ```

pub mod advisor;
pub mod classify;
pub mod profiler;

pub use advisor::{suggest_join_columns, Confidence, JoinAdvisor, JoinSuggestion};
pub use classify::{classify, ColumnCategory, ColumnEvidence, NativeTypeClass};
pub use profiler::{
    ColumnAnalysis, ColumnProfiler, ColumnProfilerBuilder, ProfileOptions, ProfilerConfig,
};
