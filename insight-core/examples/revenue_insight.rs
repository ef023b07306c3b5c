//! Example: suggest a join between two uploaded tables, then run an
//! aggregated insight over it.
//!
//! Run with `cargo run --example revenue_insight`.

use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::arrow::util::pretty::pretty_format_batches;
use insight_core::logging::setup::{init_logging, LoggingConfig};
use insight_core::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::development())?;

    let engine = Arc::new(DataFusionEngine::new()?);

    let customers = RecordBatch::try_new(
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("country", DataType::Utf8, false),
        ])),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
            Arc::new(StringArray::from(vec!["Ann", "Bo", "Cy", "Dee"])),
            Arc::new(StringArray::from(vec!["NL", "NL", "DE", "FR"])),
        ],
    )?;
    let orders = RecordBatch::try_new(
        Arc::new(Schema::new(vec![
            Field::new("customer_id", DataType::Int64, false),
            Field::new("amount", DataType::Float64, false),
        ])),
        vec![
            Arc::new(Int64Array::from(vec![1, 1, 2, 3, 3, 3])),
            Arc::new(Float64Array::from(vec![12.0, 8.5, 40.0, 3.0, 7.25, 1.0])),
        ],
    )?;

    let customers = engine.register_batches(
        "customers_0b7e2c1a-5d4f-4e3b-9a8c-7f6e5d4c3b2a",
        vec![customers],
    )?;
    let orders = engine.register_batches("orders", vec![orders])?;

    let suggestions = JoinAdvisor::new()
        .advise(engine.as_ref(), &customers, &orders)
        .await?;
    for s in &suggestions {
        println!(
            "{} ↔ {} [{}] {}",
            s.left_column, s.right_column, s.confidence, s.reason
        );
    }
    let Some(best) = suggestions.first() else {
        println!("no join suggested");
        return Ok(());
    };

    let mut fields = FieldCatalog::new();
    for column in &customers.columns {
        fields.insert(FieldDescriptor::column(
            format!("customers.{}", column.name),
            customers.id.clone(),
            column.name.clone(),
            FieldType::String,
        ));
    }
    for column in &orders.columns {
        fields.insert(FieldDescriptor::column(
            format!("orders.{}", column.name),
            orders.id.clone(),
            column.name.clone(),
            FieldType::Number,
        ));
    }

    let spec = InsightSpec::new(customers.clone())
        .select(["customers.country"])
        .join(JoinSpec::new(
            orders.clone(),
            format!("customers.{}", best.left_column),
            format!("orders.{}", best.right_column),
            JoinType::Left,
        ))
        .metric(MetricSpec::new(
            "revenue",
            "Revenue",
            orders.id.clone(),
            AggregateFunction::Sum,
            Some("amount"),
        ))
        .metric(MetricSpec::new(
            "orders",
            "Orders",
            orders.id.clone(),
            AggregateFunction::Count,
            None,
        ))
        .sort(SortSpec::desc("Revenue"));

    let runner = InsightRunner::new(engine.clone());
    println!("{}", runner.compile(&spec, &fields).await?);
    let batches = runner.run(&spec, &fields).await?;
    println!("{}", pretty_format_batches(&batches)?);

    Ok(())
}
