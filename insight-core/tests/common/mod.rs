//! Shared in-memory fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use insight_core::engine::{DataFusionEngine, EngineConfig};
use insight_core::model::{FieldCatalog, FieldDescriptor, FieldType, TableHandle};

/// Three related tables: `users`, `orders` (keyed by `user_id` and
/// `product_id`) and `products`.
pub struct Shop {
    pub engine: Arc<DataFusionEngine>,
    pub users: TableHandle,
    pub orders: TableHandle,
    pub products: TableHandle,
    pub fields: FieldCatalog,
}

pub fn engine() -> Arc<DataFusionEngine> {
    Arc::new(
        DataFusionEngine::with_config(EngineConfig::lightweight())
            .expect("engine should build with the lightweight config"),
    )
}

pub fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).expect("valid test batch")
}

pub fn shop() -> Shop {
    let engine = engine();

    let users = engine
        .register_batches(
            "users",
            vec![batch(vec![
                ("id", Arc::new(Int64Array::from(vec![1, 2, 3, 4]))),
                (
                    "name",
                    Arc::new(StringArray::from(vec!["Ann", "Bo", "O'Brien", "Dee"])),
                ),
                ("value", Arc::new(Int64Array::from(vec![10, 20, 30, 40]))),
            ])],
        )
        .expect("register users");

    let orders = engine
        .register_batches(
            "orders",
            vec![batch(vec![
                (
                    "id",
                    Arc::new(Int64Array::from(vec![100, 101, 102, 103, 104, 105])),
                ),
                ("user_id", Arc::new(Int64Array::from(vec![1, 1, 2, 3, 3, 9]))),
                (
                    "product_id",
                    Arc::new(Int64Array::from(vec![1, 2, 1, 2, 2, 1])),
                ),
                (
                    "amount",
                    Arc::new(Float64Array::from(vec![9.5, 0.5, 4.0, 10.0, 2.5, 7.0])),
                ),
                ("value", Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5, 6]))),
            ])],
        )
        .expect("register orders");

    let products = engine
        .register_batches(
            "products",
            vec![batch(vec![
                ("id", Arc::new(Int64Array::from(vec![1, 2]))),
                ("title", Arc::new(StringArray::from(vec!["Pen", "Ink"]))),
            ])],
        )
        .expect("register products");

    let fields: FieldCatalog = vec![
        FieldDescriptor::column("users.id", users.id.clone(), "id", FieldType::Number),
        FieldDescriptor::column("users.name", users.id.clone(), "name", FieldType::String),
        FieldDescriptor::column("users.value", users.id.clone(), "value", FieldType::Number),
        FieldDescriptor::column("orders.id", orders.id.clone(), "id", FieldType::Number),
        FieldDescriptor::column("orders.user_id", orders.id.clone(), "user_id", FieldType::Number),
        FieldDescriptor::column(
            "orders.product_id",
            orders.id.clone(),
            "product_id",
            FieldType::Number,
        ),
        FieldDescriptor::column("orders.amount", orders.id.clone(), "amount", FieldType::Number),
        FieldDescriptor::column("orders.value", orders.id.clone(), "value", FieldType::Number),
        FieldDescriptor::column("products.id", products.id.clone(), "id", FieldType::Number),
        FieldDescriptor::column("products.title", products.id.clone(), "title", FieldType::String),
    ]
    .into_iter()
    .collect();

    Shop {
        engine,
        users,
        orders,
        products,
        fields,
    }
}

pub fn total_rows(batches: &[RecordBatch]) -> usize {
    batches.iter().map(RecordBatch::num_rows).sum()
}

/// Output column names of a result.
pub fn column_names(batches: &[RecordBatch]) -> Vec<String> {
    batches
        .first()
        .map(|b| {
            b.schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Values of a column across all batches, rendered as strings; nulls are `None`.
pub fn strings(batches: &[RecordBatch], column: &str) -> Vec<Option<String>> {
    let mut out = Vec::new();
    for batch in batches {
        let array = batch
            .column_by_name(column)
            .unwrap_or_else(|| panic!("result has no column '{column}'"));
        let array = cast(array, &DataType::Utf8).expect("castable to Utf8");
        let array = array.as_any().downcast_ref::<StringArray>().unwrap();
        out.extend((0..array.len()).map(|i| (!array.is_null(i)).then(|| array.value(i).to_string())));
    }
    out
}

/// Values of a numeric column across all batches; nulls are `None`.
pub fn floats(batches: &[RecordBatch], column: &str) -> Vec<Option<f64>> {
    let mut out = Vec::new();
    for batch in batches {
        let array = batch
            .column_by_name(column)
            .unwrap_or_else(|| panic!("result has no column '{column}'"));
        let array = cast(array, &DataType::Float64).expect("castable to Float64");
        let array = array.as_any().downcast_ref::<Float64Array>().unwrap();
        out.extend((0..array.len()).map(|i| (!array.is_null(i)).then(|| array.value(i))));
    }
    out
}
