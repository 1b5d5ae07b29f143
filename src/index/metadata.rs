//! Record types and index definitions

use std::collections::{BTreeMap, BTreeSet};

/// A record type: its declared top-level fields and primary key field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    /// Record type name
    pub name: String,
    /// Field holding the primary key
    pub primary_key: String,
    /// Declared top-level fields
    pub fields: BTreeSet<String>,
    /// Declared fields that hold arrays
    pub repeated: BTreeSet<String>,
}

impl RecordType {
    /// Creates a record type whose primary key field is `primary_key`.
    ///
    /// The primary key field is declared implicitly.
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let primary_key = primary_key.into();
        let mut fields = BTreeSet::new();
        fields.insert(primary_key.clone());
        Self {
            name: name.into(),
            primary_key,
            fields,
            repeated: BTreeSet::new(),
        }
    }

    /// Declares a scalar or nested field
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into());
        self
    }

    /// Declares a repeated field
    pub fn with_repeated(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.fields.insert(field.clone());
        self.repeated.insert(field);
        self
    }

    /// True if the first segment of a dotted path is declared
    pub fn declares(&self, path: &str) -> bool {
        self.fields.contains(first_segment(path))
    }

    /// True if the path addresses a repeated field
    pub fn is_repeated(&self, path: &str) -> bool {
        self.repeated.contains(path)
    }
}

fn first_segment(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// One column of an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    /// Dotted field path
    pub field: String,
    /// Index each element of a repeated field separately
    pub fan_out: bool,
}

impl IndexColumn {
    /// A column over a scalar field
    pub fn value(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            fan_out: false,
        }
    }

    /// A column over each element of a repeated field
    pub fn fan_out(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            fan_out: true,
        }
    }
}

/// An index over one record type.
///
/// Entries are ordered by the column values followed by the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name, unique within the metadata
    pub name: String,
    /// Indexed record type
    pub record_type: String,
    /// Columns in key order
    pub columns: Vec<IndexColumn>,
}

impl IndexDefinition {
    /// Single-column value index
    pub fn value(
        name: impl Into<String>,
        record_type: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            columns: vec![IndexColumn::value(field)],
        }
    }

    /// Multi-column value index
    pub fn compound(
        name: impl Into<String>,
        record_type: impl Into<String>,
        fields: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            columns: fields.iter().map(|f| IndexColumn::value(*f)).collect(),
        }
    }

    /// Single-column index over the elements of a repeated field
    pub fn fan_out(
        name: impl Into<String>,
        record_type: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            columns: vec![IndexColumn::fan_out(field)],
        }
    }

    /// Index with explicit columns
    pub fn with_columns(
        name: impl Into<String>,
        record_type: impl Into<String>,
        columns: Vec<IndexColumn>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            columns,
        }
    }

    /// True if any column indexes `field`
    pub fn covers(&self, field: &str) -> bool {
        self.columns.iter().any(|c| c.field == field)
    }

    /// True if the index has a fan-out column
    pub fn has_fan_out(&self) -> bool {
        self.columns.iter().any(|c| c.fan_out)
    }
}

/// Record types and indexes known to a store and its planner.
#[derive(Debug, Clone, Default)]
pub struct RecordMetadata {
    record_types: BTreeMap<String, RecordType>,
    indexes: BTreeMap<String, IndexDefinition>,
}

impl RecordMetadata {
    /// Creates empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record type
    pub fn with_record_type(mut self, record_type: RecordType) -> Self {
        self.record_types
            .insert(record_type.name.clone(), record_type);
        self
    }

    /// Adds an index
    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.insert(index.name.clone(), index);
        self
    }

    /// Looks up a record type
    pub fn record_type(&self, name: &str) -> Option<&RecordType> {
        self.record_types.get(name)
    }

    /// Looks up an index
    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.get(name)
    }

    /// Indexes on a record type, ordered by name
    pub fn indexes_for(&self, record_type: &str) -> Vec<&IndexDefinition> {
        self.indexes
            .values()
            .filter(|i| i.record_type == record_type)
            .collect()
    }

    /// All indexes, ordered by name
    pub fn indexes(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.indexes.values()
    }
}
