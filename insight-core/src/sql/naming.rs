//! Human readable table names for column aliases.
//!
//! Uploaded tables often carry an auto-generated UUID in their name
//! (`orders_5f0c6a3e-...`). The token is stripped so aliases read
//! `"orders.amount"`. This is cosmetic and best effort.

use once_cell::sync::Lazy;
use regex::Regex;

static UUID_TOKEN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(
        r"(?i)[0-9a-f]{8}[-_]?[0-9a-f]{4}[-_]?[0-9a-f]{4}[-_]?[0-9a-f]{4}[-_]?[0-9a-f]{12}",
    )
    .expect("Hard-coded regex pattern should be valid")
});

static REPEATED_SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[_\-\s]{2,}").expect("Hard-coded regex pattern should be valid")
});

/// Strips UUID-looking tokens from a table name.
///
/// Falls back to the input when nothing readable is left.
pub fn display_name(name: &str) -> String {
    let stripped = UUID_TOKEN.replace_all(name, "");
    let collapsed = REPEATED_SEPARATORS.replace_all(&stripped, "_");
    let trimmed = collapsed.trim_matches(|c: char| c == '_' || c == '-' || c.is_whitespace());
    if trimmed.is_empty() {
        name.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_are_untouched() {
        assert_eq!(display_name("Orders"), "Orders");
        assert_eq!(display_name("sales 2024"), "sales 2024");
    }

    #[test]
    fn test_uuid_suffix_is_stripped() {
        assert_eq!(
            display_name("orders_5f0c6a3e-1b2c-4d5e-8f90-123456789abc"),
            "orders"
        );
        assert_eq!(
            display_name("5F0C6A3E1B2C4D5E8F90123456789ABC_customers"),
            "customers"
        );
    }

    #[test]
    fn test_uuid_in_the_middle() {
        assert_eq!(
            display_name("raw__5f0c6a3e_1b2c_4d5e_8f90_123456789abc__events"),
            "raw_events"
        );
    }

    #[test]
    fn test_uuid_only_name_falls_back() {
        let name = "5f0c6a3e-1b2c-4d5e-8f90-123456789abc";
        assert_eq!(display_name(name), name);
    }
}
