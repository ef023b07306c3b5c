//! Typed scalar values used in filter predicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scalar that can be rendered as a SQL literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    /// Text, rendered single-quoted
    String(String),
    /// Floating point number, rendered bare
    Number(f64),
    /// Integer beyond the safe floating point range, rendered bare
    BigInt(i128),
    /// Rendered as `TRUE` / `FALSE`
    Boolean(bool),
    /// Rendered as a single-quoted ISO-8601 string
    Date(DateTime<Utc>),
    /// Rendered as the bare `NULL` keyword
    Null,
}

impl SqlValue {
    /// Returns true for [`SqlValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Number(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Number(f64::from(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(i128::from(value))
    }
}

impl From<i128> for SqlValue {
    fn from(value: i128) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Date(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}
