//! SQL generation: literal formatting, single-table plans and insight compilation.

pub mod builder;
pub mod compiler;
pub mod format;
pub mod naming;

pub use builder::{Aggregation, QueryBuilder, QueryPlan};
pub use compiler::{CompilerConfig, InsightCompiler};
pub use format::{SqlFormatter, MAX_IDENTIFIER_LENGTH};
pub use naming::display_name;
