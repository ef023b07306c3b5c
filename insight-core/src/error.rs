//! Error types for the insight library.
//!
//! All errors are represented by the [`InsightError`] enum. Compilation errors
//! describe an invalid [`InsightSpec`](crate::model::InsightSpec) and carry the
//! offending field or table name; they are never transient and callers should
//! not retry them.

use thiserror::Error;

/// The main error type for the insight library.
#[derive(Error, Debug)]
pub enum InsightError {
    /// A join's base or target key field could not be resolved to a physical column.
    #[error(
        "Join key fields not found for join on '{join_table}' (base field '{base_field}', target field '{target_field}')"
    )]
    JoinKeyNotFound {
        /// Display name of the joined table
        join_table: String,
        /// Field id on the base table side
        base_field: String,
        /// Field id on the target table side
        target_field: String,
    },

    /// A table taking part in the query has no data loaded in the engine.
    #[error("Join table '{table}' has no data")]
    TableNotLoaded {
        /// Display name of the table
        table: String,
    },

    /// A selected field id is unknown to the resolver.
    #[error("Field '{field_id}' not found")]
    FieldNotFound { field_id: String },

    /// A metric whose aggregation cannot be compiled.
    #[error("Invalid metric '{metric}': {message}")]
    InvalidMetric { metric: String, message: String },

    /// A field or metric refers to a table that is not part of the insight.
    #[error("Table '{table}' is not part of this insight")]
    UnknownTable { table: String },

    /// An identifier that cannot be quoted safely.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error while profiling a single column.
    #[error("Analysis of column '{column}' failed: {message}")]
    Analysis { column: String, message: String },

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, InsightError>`.
pub type Result<T> = std::result::Result<T, InsightError>;

impl InsightError {
    /// Creates a new join key error.
    pub fn join_key_not_found(
        join_table: impl Into<String>,
        base_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        Self::JoinKeyNotFound {
            join_table: join_table.into(),
            base_field: base_field.into(),
            target_field: target_field.into(),
        }
    }

    /// Creates a new error for a table without loaded data.
    pub fn table_not_loaded(table: impl Into<String>) -> Self {
        Self::TableNotLoaded {
            table: table.into(),
        }
    }

    /// Creates a new invalid metric error.
    pub fn invalid_metric(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidMetric {
            metric: metric.into(),
            message: message.into(),
        }
    }

    /// Creates a new column analysis error.
    pub fn analysis(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analysis {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Returns true when the error stems from an invalid insight specification.
    pub fn is_compilation_error(&self) -> bool {
        matches!(
            self,
            Self::JoinKeyNotFound { .. }
                | Self::TableNotLoaded { .. }
                | Self::FieldNotFound { .. }
                | Self::InvalidMetric { .. }
                | Self::UnknownTable { .. }
                | Self::InvalidIdentifier(_)
        )
    }
}

impl From<serde_json::Error> for InsightError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<InsightError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            InsightError::Internal(inner) => InsightError::Internal(format!("{msg}: {inner}")),
            other => InsightError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                InsightError::Internal(inner) => InsightError::Internal(format!("{msg}: {inner}")),
                other => InsightError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}
