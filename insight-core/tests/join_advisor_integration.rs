//! Integration tests for join key advice over profiled tables.

mod common;

use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use common::{batch, engine};
use insight_core::analyzers::{Confidence, JoinAdvisor, JoinSuggestion};
use insight_core::engine::DataFusionEngine;
use insight_core::model::TableHandle;

fn users(engine: &DataFusionEngine, display_name: &str) -> TableHandle {
    let names: Vec<String> = (1..=12).map(|i| format!("user {i}")).collect();
    engine
        .register_batches(
            display_name,
            vec![batch(vec![
                ("id", Arc::new(Int64Array::from((1..=12).collect::<Vec<i64>>()))),
                ("name", Arc::new(StringArray::from(names))),
            ])],
        )
        .unwrap()
}

fn orders(engine: &DataFusionEngine) -> TableHandle {
    let user_ids: Vec<i64> = (0..30).map(|i| i % 12 + 1).collect();
    let status: Vec<&str> = (0..30).map(|i| if i % 3 == 0 { "open" } else { "paid" }).collect();
    engine
        .register_batches(
            "orders",
            vec![batch(vec![
                ("user_id", Arc::new(Int64Array::from(user_ids))),
                ("status", Arc::new(StringArray::from(status))),
                ("_rowIndex", Arc::new(Int64Array::from((0..30).collect::<Vec<i64>>()))),
            ])],
        )
        .unwrap()
}

#[tokio::test]
async fn test_foreign_key_pattern_between_profiled_tables() {
    let engine = engine();
    let users = users(&engine, "users");
    let orders = orders(&engine);

    let suggestions = JoinAdvisor::new()
        .advise(engine.as_ref(), &users, &orders)
        .await
        .unwrap();

    assert_eq!(
        suggestions,
        vec![JoinSuggestion {
            left_column: "id".to_string(),
            right_column: "user_id".to_string(),
            confidence: Confidence::High,
            reason: "Foreign key pattern: users.id → user_id".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_reverse_direction_and_generated_names() {
    let engine = engine();
    let users = users(&engine, "users_5f0c6a3e-1b2c-4d5e-8f90-123456789abc");
    let orders = orders(&engine);

    let suggestions = JoinAdvisor::new()
        .advise(engine.as_ref(), &orders, &users)
        .await
        .unwrap();

    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].left_column, "user_id");
    assert_eq!(suggestions[0].right_column, "id");
    assert_eq!(suggestions[0].reason, "Foreign key pattern: users.id → user_id");
}

#[tokio::test]
async fn test_internal_columns_are_never_suggested() {
    let engine = engine();
    let left = orders(&engine);
    let right = orders(&engine);

    let suggestions = JoinAdvisor::new()
        .advise(engine.as_ref(), &left, &right)
        .await
        .unwrap();

    assert!(!suggestions.is_empty());
    assert!(suggestions
        .iter()
        .all(|s| s.left_column != "_rowIndex" && s.right_column != "_rowIndex"));
    assert_eq!(suggestions[0].left_column, "user_id");
    assert_eq!(suggestions[0].confidence, Confidence::High);
}

#[tokio::test]
async fn test_same_name_categorical_columns() {
    let engine = engine();
    let regions = ["north", "south", "east", "west"];
    let sales = engine
        .register_batches(
            "sales",
            vec![batch(vec![
                (
                    "region",
                    Arc::new(StringArray::from(
                        (0..40).map(|i| regions[i % 4]).collect::<Vec<_>>(),
                    )),
                ),
                (
                    "revenue",
                    Arc::new(Float64Array::from(
                        (0..40).map(|i| (i % 7) as f64).collect::<Vec<_>>(),
                    )),
                ),
            ])],
        )
        .unwrap();
    let targets = engine
        .register_batches(
            "targets",
            vec![batch(vec![
                (
                    "Region",
                    Arc::new(StringArray::from(
                        (0..20).map(|i| regions[i % 4]).collect::<Vec<_>>(),
                    )),
                ),
                (
                    "goal",
                    Arc::new(Float64Array::from(
                        (0..20).map(|i| (i % 3) as f64).collect::<Vec<_>>(),
                    )),
                ),
            ])],
        )
        .unwrap();

    let suggestions = JoinAdvisor::new()
        .advise(engine.as_ref(), &sales, &targets)
        .await
        .unwrap();

    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].left_column, "region");
    assert_eq!(suggestions[0].right_column, "Region");
    assert_eq!(suggestions[0].confidence, Confidence::Medium);
}

#[tokio::test]
async fn test_potential_foreign_key_on_unique_text() {
    let engine = engine();
    let codes: Vec<String> = (1..=12).map(|i| format!("C-{i:03}")).collect();
    let legacy = engine
        .register_batches(
            "legacy",
            vec![batch(vec![("customer", Arc::new(StringArray::from(codes.clone())))])],
        )
        .unwrap();
    let invoices = engine
        .register_batches(
            "invoices",
            vec![batch(vec![
                (
                    "customer_id",
                    Arc::new(StringArray::from(
                        (0..24).map(|i| codes[i % 12].clone()).collect::<Vec<_>>(),
                    )),
                ),
                (
                    "total",
                    Arc::new(Float64Array::from(
                        (0..24).map(|i| (i % 5) as f64).collect::<Vec<_>>(),
                    )),
                ),
            ])],
        )
        .unwrap();

    let suggestions = JoinAdvisor::new()
        .advise(engine.as_ref(), &legacy, &invoices)
        .await
        .unwrap();

    assert_eq!(
        suggestions,
        vec![JoinSuggestion {
            left_column: "customer".to_string(),
            right_column: "customer_id".to_string(),
            confidence: Confidence::Low,
            reason: "Potential foreign key: customer → customer_id".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_unrelated_tables_yield_no_suggestions() {
    let engine = engine();
    let colors = engine
        .register_batches(
            "colors",
            vec![batch(vec![(
                "color",
                Arc::new(StringArray::from(vec!["red", "green", "red"])),
            )])],
        )
        .unwrap();
    let weights = engine
        .register_batches(
            "weights",
            vec![batch(vec![(
                "weight",
                Arc::new(Float64Array::from(vec![1.5, 2.5, 1.5])),
            )])],
        )
        .unwrap();

    let suggestions = JoinAdvisor::new()
        .advise(engine.as_ref(), &colors, &weights)
        .await
        .unwrap();
    assert!(suggestions.is_empty());
}
