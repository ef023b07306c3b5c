//! Tables loaded into the engine and the user-facing fields they declare.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Stable identifier of a table.
pub type TableId = String;

/// Stable identifier of a field.
pub type FieldId = String;

/// A physical column as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Engine type name, e.g. `Int64` or `Utf8`
    pub native_type: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
        }
    }
}

/// Reference to a relation the engine can query.
///
/// `engine_name` is absent until data has been loaded; compiling an insight
/// that touches an unloaded table fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableHandle {
    pub id: TableId,
    /// Human readable name, possibly carrying an auto-generated UUID
    pub display_name: String,
    pub engine_name: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableHandle {
    /// Creates a handle for a table whose data has not been loaded yet.
    pub fn unloaded(id: impl Into<TableId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            engine_name: None,
            columns: Vec::new(),
        }
    }

    /// Creates a handle for a table registered in the engine.
    pub fn loaded(
        id: impl Into<TableId>,
        display_name: impl Into<String>,
        engine_name: impl Into<String>,
        columns: Vec<ColumnDescriptor>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            engine_name: Some(engine_name.into()),
            columns,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.engine_name.is_some()
    }

    pub fn engine_name(&self) -> Option<&str> {
        self.engine_name.as_deref()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Normalized user-facing type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Unknown,
}

/// User-facing metadata for a column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub display_name: String,
    pub table_id: TableId,
    /// `None` for computed fields that have no physical column
    pub column_name: Option<String>,
    pub field_type: FieldType,
    #[serde(default)]
    pub is_identifier_hint: bool,
    #[serde(default)]
    pub is_reference_hint: bool,
}

impl FieldDescriptor {
    /// Creates a field backed by a physical column.
    pub fn column(
        id: impl Into<FieldId>,
        table_id: impl Into<TableId>,
        column_name: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        let column_name = column_name.into();
        Self {
            id: id.into(),
            display_name: column_name.clone(),
            table_id: table_id.into(),
            column_name: Some(column_name),
            field_type,
            is_identifier_hint: false,
            is_reference_hint: false,
        }
    }

    /// Creates a computed field without a physical column.
    pub fn computed(
        id: impl Into<FieldId>,
        table_id: impl Into<TableId>,
        display_name: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            table_id: table_id.into(),
            column_name: None,
            field_type,
            is_identifier_hint: false,
            is_reference_hint: false,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn identifier(mut self) -> Self {
        self.is_identifier_hint = true;
        self
    }

    pub fn reference(mut self) -> Self {
        self.is_reference_hint = true;
        self
    }

    pub fn is_computed(&self) -> bool {
        self.column_name.is_none()
    }
}

/// Maps field ids to their descriptors.
pub trait FieldResolver: Send + Sync {
    fn resolve(&self, field_id: &str) -> Option<&FieldDescriptor>;
}

/// In-memory [`FieldResolver`] keyed by field id.
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    fields: HashMap<FieldId, FieldDescriptor>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any field with the same id.
    pub fn insert(&mut self, field: FieldDescriptor) {
        self.fields.insert(field.id.clone(), field);
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.insert(field);
        self
    }

    /// Renames a field's display name; the only mutation a field allows.
    pub fn rename(&mut self, field_id: &str, display_name: impl Into<String>) -> bool {
        match self.fields.get_mut(field_id) {
            Some(field) => {
                field.display_name = display_name.into();
                true
            }
            None => false,
        }
    }

    /// Fields declared by a table.
    pub fn fields_for_table<'a>(
        &'a self,
        table_id: &'a str,
    ) -> impl Iterator<Item = &'a FieldDescriptor> + 'a {
        self.fields.values().filter(move |f| f.table_id == table_id)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldResolver for FieldCatalog {
    fn resolve(&self, field_id: &str) -> Option<&FieldDescriptor> {
        self.fields.get(field_id)
    }
}

impl FromIterator<FieldDescriptor> for FieldCatalog {
    fn from_iter<I: IntoIterator<Item = FieldDescriptor>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for field in iter {
            catalog.insert(field);
        }
        catalog
    }
}
