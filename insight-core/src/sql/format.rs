//! SQL literal and predicate rendering.
//!
//! Every identifier is double-quoted with embedded `"` doubled and every
//! string literal is single-quoted with embedded `'` doubled, so user input
//! never reaches the statement unescaped.

use chrono::SecondsFormat;

use crate::error::{InsightError, Result};
use crate::model::{FilterPredicate, SqlValue};

/// Maximum identifier length accepted by [`SqlFormatter::validate_identifier`].
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Renders values, identifiers and predicates in the engine's dialect.
pub struct SqlFormatter;

impl SqlFormatter {
    /// Double-quotes an identifier.
    ///
    /// # Examples
    /// ```rust
    /// use insight_core::sql::SqlFormatter;
    ///
    /// assert_eq!(SqlFormatter::quote_identifier("amount"), "\"amount\"");
    /// assert_eq!(SqlFormatter::quote_identifier("a\"b"), "\"a\"\"b\"");
    /// ```
    pub fn quote_identifier(identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Renders `alias."column"`.
    pub fn qualified(alias: &str, column: &str) -> String {
        format!("{alias}.{}", Self::quote_identifier(column))
    }

    /// Checks that an identifier can be quoted safely.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(InsightError::InvalidIdentifier(
                "identifier cannot be empty or whitespace-only".to_string(),
            ));
        }
        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(InsightError::InvalidIdentifier(format!(
                "identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }
        if identifier.contains('\0') {
            return Err(InsightError::InvalidIdentifier(
                "identifier cannot contain null bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// Single-quotes a string literal.
    pub fn quote_string(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Renders a scalar as a SQL literal.
    ///
    /// Non-finite numbers have no literal form and render as `NULL`.
    pub fn format_value(value: &SqlValue) -> String {
        match value {
            SqlValue::String(s) => Self::quote_string(s),
            SqlValue::Number(n) if n.is_finite() => n.to_string(),
            SqlValue::Number(_) => "NULL".to_string(),
            SqlValue::BigInt(n) => n.to_string(),
            SqlValue::Boolean(true) => "TRUE".to_string(),
            SqlValue::Boolean(false) => "FALSE".to_string(),
            SqlValue::Date(d) => Self::quote_string(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            SqlValue::Null => "NULL".to_string(),
        }
    }

    /// Renders a single predicate against an unqualified column.
    pub fn format_predicate(predicate: &FilterPredicate) -> String {
        let column = Self::quote_identifier(&predicate.column_name);
        let op = predicate.operator;

        if op.is_unary() {
            return format!("{column} {}", op.as_sql());
        }

        if op.is_set() {
            let list = predicate
                .values
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(Self::format_value)
                .collect::<Vec<_>>()
                .join(", ");
            return format!("{column} {} ({list})", op.as_sql());
        }

        let literal = predicate
            .value
            .as_ref()
            .map_or_else(|| "NULL".to_string(), Self::format_value);
        format!("{column} {} {literal}", op.as_sql())
    }

    /// Joins predicates with `AND` in list order; `None` when there are none.
    pub fn format_predicates(predicates: &[FilterPredicate]) -> Option<String> {
        if predicates.is_empty() {
            return None;
        }
        Some(
            predicates
                .iter()
                .map(Self::format_predicate)
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FilterOperator;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_string_literal_escaping() {
        assert_eq!(
            SqlFormatter::format_value(&SqlValue::from("O'Brien")),
            "'O''Brien'"
        );
        assert_eq!(SqlFormatter::format_value(&SqlValue::from("")), "''");
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(SqlFormatter::format_value(&SqlValue::Number(42.0)), "42");
        assert_eq!(SqlFormatter::format_value(&SqlValue::Number(-1.5)), "-1.5");
        assert_eq!(
            SqlFormatter::format_value(&SqlValue::BigInt(9_007_199_254_740_993)),
            "9007199254740993"
        );
        assert_eq!(SqlFormatter::format_value(&SqlValue::Boolean(true)), "TRUE");
        assert_eq!(SqlFormatter::format_value(&SqlValue::Boolean(false)), "FALSE");
        assert_eq!(SqlFormatter::format_value(&SqlValue::Null), "NULL");
        assert_eq!(SqlFormatter::format_value(&SqlValue::Number(f64::NAN)), "NULL");
    }

    #[test]
    fn test_date_literal_is_iso_8601() {
        let date = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        assert_eq!(
            SqlFormatter::format_value(&SqlValue::Date(date)),
            "'2024-03-05T14:30:00.000Z'"
        );
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(SqlFormatter::quote_identifier("user id"), "\"user id\"");
        assert_eq!(
            SqlFormatter::quote_identifier("x\" OR 1=1 --"),
            "\"x\"\" OR 1=1 --\""
        );
        assert_eq!(SqlFormatter::qualified("base", "id"), "base.\"id\"");
    }

    #[test]
    fn test_identifier_validation() {
        assert!(SqlFormatter::validate_identifier("orders").is_ok());
        assert!(SqlFormatter::validate_identifier("with \"quotes\"").is_ok());
        assert!(SqlFormatter::validate_identifier("  ").is_err());
        assert!(SqlFormatter::validate_identifier("a\0b").is_err());
        assert!(SqlFormatter::validate_identifier(&"x".repeat(300)).is_err());
    }

    #[test]
    fn test_binary_predicates() {
        let p = FilterPredicate::compare("age", FilterOperator::GtEq, 18);
        assert_eq!(SqlFormatter::format_predicate(&p), "\"age\" >= 18");

        let p = FilterPredicate::eq("name", "O'Brien");
        assert_eq!(SqlFormatter::format_predicate(&p), "\"name\" = 'O''Brien'");

        let p = FilterPredicate::eq("deleted_at", SqlValue::Null);
        assert_eq!(SqlFormatter::format_predicate(&p), "\"deleted_at\" = NULL");
    }

    #[test]
    fn test_unary_predicates() {
        assert_eq!(
            SqlFormatter::format_predicate(&FilterPredicate::is_null("email")),
            "\"email\" IS NULL"
        );
        assert_eq!(
            SqlFormatter::format_predicate(&FilterPredicate::is_not_null("email")),
            "\"email\" IS NOT NULL"
        );
    }

    #[test]
    fn test_set_predicates() {
        let p = FilterPredicate::in_list("status", ["open", "closed"]);
        assert_eq!(
            SqlFormatter::format_predicate(&p),
            "\"status\" IN ('open', 'closed')"
        );

        let p = FilterPredicate::not_in_list("id", [1, 2]);
        assert_eq!(SqlFormatter::format_predicate(&p), "\"id\" NOT IN (1, 2)");

        let empty = FilterPredicate::in_list("id", Vec::<i32>::new());
        assert_eq!(SqlFormatter::format_predicate(&empty), "\"id\" IN ()");
    }

    #[test]
    fn test_predicates_join_with_and() {
        let preds = vec![
            FilterPredicate::eq("a", 1),
            FilterPredicate::is_not_null("b"),
        ];
        assert_eq!(
            SqlFormatter::format_predicates(&preds).unwrap(),
            "\"a\" = 1 AND \"b\" IS NOT NULL"
        );
        assert!(SqlFormatter::format_predicates(&[]).is_none());
    }
}
