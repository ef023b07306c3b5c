//! Ranking of candidate join keys between two profiled tables.
//!
//! Suggestions come from four strategies tried in order of confidence:
//!
//! 1. **Exact key match** (high): key-like columns with the same normalized name
//! 2. **Foreign key pattern** (high): one table's `id` against `<singular table name>_id`
//!    on the other side, in both directions
//! 3. **Same name** (medium): equal normalized names with compatible categories,
//!    for columns no earlier strategy claimed
//! 4. **Potential foreign key** (low): `<base>_id` columns whose base names an
//!    unclaimed identifier on the left
//!
//! Names are normalized by lowercasing and dropping `_` and `-`. Internal
//! columns (leading `_`, or `rowindex` once normalized) are never suggested.
//!
//! # Example
//!
//! ```rust
//! use insight_core::analyzers::{suggest_join_columns, ColumnAnalysis, ColumnCategory, Confidence};
//!
//! let users = vec![ColumnAnalysis::with_category("id", ColumnCategory::Identifier)];
//! let orders = vec![ColumnAnalysis::with_category("user_id", ColumnCategory::Identifier)];
//!
//! let suggestions = suggest_join_columns(&users, &orders, Some("users"), Some("orders"));
//! assert_eq!(suggestions.len(), 1);
//! assert_eq!(suggestions[0].confidence, Confidence::High);
//! assert_eq!(suggestions[0].reason, "Foreign key pattern: users.id → user_id");
//! ```

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::classify::ColumnCategory;
use super::profiler::{ColumnAnalysis, ColumnProfiler, ProfileOptions};
use crate::engine::QueryEngine;
use crate::error::Result;
use crate::model::TableHandle;
use crate::sql::display_name;

static FOREIGN_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?i)^(.+?)[-_]?id$").expect("Hard-coded regex pattern should be valid")
});

/// Confidence tier of a suggestion; orders high first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// A proposed join key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSuggestion {
    pub left_column: String,
    pub right_column: String,
    pub confidence: Confidence,
    /// Human-readable explanation for the suggestion
    pub reason: String,
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_internal(name: &str) -> bool {
    name.starts_with('_') || normalize(name) == "rowindex"
}

/// Normalized base of a `<base>_id` style name.
fn foreign_key_base(name: &str) -> Option<String> {
    FOREIGN_KEY_PATTERN
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| normalize(m.as_str()))
        .filter(|base| !base.is_empty())
}

/// Normalized singular form of a table name: `Users` → `user`.
fn singular_base(table_name: &str) -> String {
    let name = display_name(table_name);
    let name = name
        .strip_suffix('s')
        .or_else(|| name.strip_suffix('S'))
        .unwrap_or(&name);
    normalize(name)
}

fn compatible(a: ColumnCategory, b: ColumnCategory) -> bool {
    a == b
        || (a.is_key_like() && b.is_key_like())
        || matches!(
            (a, b),
            (ColumnCategory::Numerical, ColumnCategory::Identifier)
                | (ColumnCategory::Identifier, ColumnCategory::Numerical)
        )
}

/// Accumulates suggestions and the columns they claim.
#[derive(Default)]
struct Suggestions {
    found: Vec<JoinSuggestion>,
    pairs: HashSet<(String, String)>,
    used_left: HashSet<String>,
    used_right: HashSet<String>,
}

impl Suggestions {
    fn push(&mut self, left: &str, right: &str, confidence: Confidence, reason: String) {
        if !self.pairs.insert((left.to_string(), right.to_string())) {
            return;
        }
        self.used_left.insert(left.to_string());
        self.used_right.insert(right.to_string());
        self.found.push(JoinSuggestion {
            left_column: left.to_string(),
            right_column: right.to_string(),
            confidence,
            reason,
        });
    }

    fn claimed(&self, left: &str, right: &str) -> bool {
        self.used_left.contains(left) || self.used_right.contains(right)
    }
}

/// Proposes join key pairs between two tables' column analyses.
///
/// An empty result is a valid outcome.
pub fn suggest_join_columns(
    left: &[ColumnAnalysis],
    right: &[ColumnAnalysis],
    left_table: Option<&str>,
    right_table: Option<&str>,
) -> Vec<JoinSuggestion> {
    let left: Vec<&ColumnAnalysis> = left.iter().filter(|c| !is_internal(&c.column_name)).collect();
    let right: Vec<&ColumnAnalysis> = right.iter().filter(|c| !is_internal(&c.column_name)).collect();
    let mut out = Suggestions::default();

    // 1. exact match between key-like columns
    for l in left.iter().filter(|c| c.category.is_key_like()) {
        for r in right.iter().filter(|c| c.category.is_key_like()) {
            if normalize(&l.column_name) == normalize(&r.column_name) {
                out.push(
                    &l.column_name,
                    &r.column_name,
                    Confidence::High,
                    format!("Exact match on \"{}\"", l.column_name),
                );
            }
        }
    }

    // 2. `<table>.id` against `<table>_id`, left to right then right to left
    let has_id = |columns: &[&ColumnAnalysis]| {
        columns
            .iter()
            .any(|c| c.column_name == "id" && c.category.is_key_like())
    };
    if let Some(table) = left_table.filter(|_| has_id(left.as_slice())) {
        let base = singular_base(table);
        let table = display_name(table);
        for r in &right {
            if foreign_key_base(&r.column_name).as_deref() == Some(base.as_str()) {
                out.push(
                    "id",
                    &r.column_name,
                    Confidence::High,
                    format!("Foreign key pattern: {table}.id → {}", r.column_name),
                );
            }
        }
    }
    if let Some(table) = right_table.filter(|_| has_id(right.as_slice())) {
        let base = singular_base(table);
        let table = display_name(table);
        for l in &left {
            if foreign_key_base(&l.column_name).as_deref() == Some(base.as_str()) {
                out.push(
                    &l.column_name,
                    "id",
                    Confidence::High,
                    format!("Foreign key pattern: {table}.id → {}", l.column_name),
                );
            }
        }
    }

    // 3. same name, compatible categories
    for l in &left {
        for r in &right {
            if out.claimed(&l.column_name, &r.column_name) {
                continue;
            }
            if normalize(&l.column_name) == normalize(&r.column_name)
                && compatible(l.category, r.category)
            {
                out.push(
                    &l.column_name,
                    &r.column_name,
                    Confidence::Medium,
                    format!("Same column name \"{}\"", l.column_name),
                );
            }
        }
    }

    // 4. `<base>_id` on the right naming a left identifier
    for r in &right {
        if out.used_right.contains(&r.column_name) {
            continue;
        }
        let Some(base) = foreign_key_base(&r.column_name) else {
            continue;
        };
        let target = left.iter().find(|l| {
            l.category == ColumnCategory::Identifier
                && !out.used_left.contains(&l.column_name)
                && (normalize(&l.column_name) == base
                    || foreign_key_base(&l.column_name).as_deref() == Some(base.as_str()))
        });
        if let Some(l) = target {
            out.push(
                &l.column_name,
                &r.column_name,
                Confidence::Low,
                format!("Potential foreign key: {} → {}", l.column_name, r.column_name),
            );
        }
    }

    let mut suggestions = out.found;
    suggestions.sort_by_key(|s| s.confidence);
    suggestions
}

/// Profiles two tables and ranks join keys between them.
#[derive(Debug, Clone, Default)]
pub struct JoinAdvisor {
    profiler: ColumnProfiler,
}

impl JoinAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiler(profiler: ColumnProfiler) -> Self {
        Self { profiler }
    }

    /// Ranks join keys between already analyzed columns.
    #[instrument(skip(self, left, right), fields(left_columns = left.len(), right_columns = right.len()))]
    pub fn suggest(
        &self,
        left: &[ColumnAnalysis],
        right: &[ColumnAnalysis],
        left_table: Option<&str>,
        right_table: Option<&str>,
    ) -> Vec<JoinSuggestion> {
        let suggestions = suggest_join_columns(left, right, left_table, right_table);
        debug!(suggestions = suggestions.len(), "Ranked join suggestions");
        suggestions
    }

    /// Profiles both tables concurrently, then ranks join keys between them.
    #[instrument(skip(self, engine, left, right), fields(left = %left.display_name, right = %right.display_name))]
    pub async fn advise(
        &self,
        engine: &dyn QueryEngine,
        left: &TableHandle,
        right: &TableHandle,
    ) -> Result<Vec<JoinSuggestion>> {
        let options = ProfileOptions::default();
        let (left_columns, right_columns) = futures::try_join!(
            self.profiler.profile_table(engine, left, &options),
            self.profiler.profile_table(engine, right, &options)
        )?;
        Ok(self.suggest(
            &left_columns,
            &right_columns,
            Some(&left.display_name),
            Some(&right.display_name),
        ))
    }
}
