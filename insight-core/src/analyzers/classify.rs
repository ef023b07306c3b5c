//! Semantic categories of profiled columns.
//!
//! Classification is a cascade where the first matching rule wins: explicit
//! field hints, then identifier naming and uniqueness, then rules keyed on the
//! engine-reported type and on the sampled values.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::profiler::ProfilerConfig;

/// What a column means, as opposed to how it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnCategory {
    Identifier,
    Reference,
    Categorical,
    Numerical,
    Temporal,
    Boolean,
    Email,
    Url,
    Uuid,
    Text,
    /// Analysis of the column failed
    Unknown,
}

impl ColumnCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnCategory::Identifier => "identifier",
            ColumnCategory::Reference => "reference",
            ColumnCategory::Categorical => "categorical",
            ColumnCategory::Numerical => "numerical",
            ColumnCategory::Temporal => "temporal",
            ColumnCategory::Boolean => "boolean",
            ColumnCategory::Email => "email",
            ColumnCategory::Url => "url",
            ColumnCategory::Uuid => "uuid",
            ColumnCategory::Text => "text",
            ColumnCategory::Unknown => "unknown",
        }
    }

    /// Identifiers and references are the candidates for join keys.
    pub fn is_key_like(&self) -> bool {
        matches!(self, ColumnCategory::Identifier | ColumnCategory::Reference)
    }
}

impl fmt::Display for ColumnCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse class of an engine type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeTypeClass {
    Boolean,
    Numeric,
    Temporal,
    String,
    Other,
}

impl NativeTypeClass {
    /// Classifies an engine type name such as `Int64`, `Utf8View`,
    /// `Timestamp(Nanosecond, None)` or `VARCHAR`.
    pub fn from_type_name(type_name: &str) -> Self {
        let lower = type_name.trim().to_ascii_lowercase();

        // Dictionary(Int32, Utf8) is classified by its value type
        if let Some(inner) = lower.strip_prefix("dictionary(") {
            if let Some((_, value_type)) = inner.split_once(',') {
                return Self::from_type_name(value_type.trim().trim_end_matches(')'));
            }
        }

        if lower.contains("date")
            || lower.contains("timestamp")
            || lower.starts_with("time")
            || lower.starts_with("interval")
            || lower.starts_with("duration")
        {
            Self::Temporal
        } else if lower.starts_with("bool") {
            Self::Boolean
        } else if lower.contains("int")
            || lower.starts_with("float")
            || lower.starts_with("decimal")
            || lower.starts_with("double")
            || lower.starts_with("real")
            || lower.starts_with("numeric")
        {
            Self::Numeric
        } else if lower.contains("utf8")
            || lower.contains("char")
            || lower.contains("string")
            || lower == "text"
        {
            Self::String
        } else {
            Self::Other
        }
    }
}

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Hard-coded regex pattern should be valid")
});

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?i)^(https?://|www\.)\S+$").expect("Hard-coded regex pattern should be valid")
});

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("Hard-coded regex pattern should be valid")
});

// camelCase `customerId`
static CAMEL_CASE_ID: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[a-z0-9]Id$").expect("Hard-coded regex pattern should be valid")
});

const NUMERIC_ID_SUFFIXES: &[&str] = &["id", "_id", "key", "no", "num", "index", "seq"];
const NUMERIC_ID_EXCLUSIONS: &[&str] = &["zipcode", "postcode", "areacode"];

/// Share of samples matching a pattern; zero without samples.
fn match_ratio(samples: &[String], pattern: &Regex) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let matched = samples.iter().filter(|s| pattern.is_match(s.trim())).count();
    matched as f64 / samples.len() as f64
}

/// Whether a column name follows an identifier naming convention.
pub fn has_identifier_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "id"
        || lower.ends_with("_id")
        || lower.starts_with("id_")
        || lower == "uuid"
        || lower == "guid"
        || lower == "_rowindex"
        || CAMEL_CASE_ID.is_match(name)
}

/// Whether a numeric column name reads like a key or sequence number.
pub fn has_numeric_id_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let normalized: String = lower.chars().filter(|c| *c != '_' && *c != '-').collect();
    if NUMERIC_ID_EXCLUSIONS.iter().any(|e| normalized.contains(e)) {
        return false;
    }
    NUMERIC_ID_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Everything the cascade looks at for one column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnEvidence<'a> {
    pub name: &'a str,
    pub native_type: &'a str,
    pub cardinality: u64,
    pub row_count: u64,
    pub uniqueness: f64,
    pub samples: &'a [String],
    pub is_identifier_hint: bool,
    pub is_reference_hint: bool,
}

/// Runs the classification cascade.
pub fn classify(evidence: &ColumnEvidence<'_>, config: &ProfilerConfig) -> ColumnCategory {
    if evidence.is_identifier_hint {
        return ColumnCategory::Identifier;
    }
    if evidence.is_reference_hint {
        return ColumnCategory::Reference;
    }

    // UUID-valued columns are left to the value pattern detectors
    let uuid_ratio = match_ratio(evidence.samples, &UUID_PATTERN);
    let uuid_valued = uuid_ratio >= config.pattern_threshold;

    if !uuid_valued
        && (has_identifier_name(evidence.name)
            || (evidence.uniqueness > config.identifier_uniqueness
                && evidence.cardinality > config.identifier_min_cardinality))
    {
        return ColumnCategory::Identifier;
    }

    match NativeTypeClass::from_type_name(evidence.native_type) {
        NativeTypeClass::Boolean => ColumnCategory::Boolean,
        NativeTypeClass::Numeric if has_numeric_id_name(evidence.name) => {
            ColumnCategory::Identifier
        }
        NativeTypeClass::Numeric => ColumnCategory::Numerical,
        NativeTypeClass::Temporal => ColumnCategory::Temporal,
        NativeTypeClass::String | NativeTypeClass::Other => {
            classify_text(evidence, uuid_ratio, config)
        }
    }
}

fn classify_text(evidence: &ColumnEvidence<'_>, uuid_ratio: f64, config: &ProfilerConfig) -> ColumnCategory {
    if match_ratio(evidence.samples, &EMAIL_PATTERN) >= config.pattern_threshold {
        return ColumnCategory::Email;
    }
    if match_ratio(evidence.samples, &URL_PATTERN) >= config.pattern_threshold {
        return ColumnCategory::Url;
    }
    if uuid_ratio >= config.pattern_threshold {
        return ColumnCategory::Uuid;
    }
    if evidence.uniqueness >= 1.0 && evidence.row_count > 1 {
        return ColumnCategory::Identifier;
    }

    let ratio_limit = evidence.row_count as f64 * config.categorical_ratio;
    if (evidence.cardinality as f64) < ratio_limit
        || evidence.cardinality < config.categorical_max_cardinality
    {
        return ColumnCategory::Categorical;
    }
    ColumnCategory::Text
}
