//! Record store: the range-scan capability plans execute against
//!
//! `RecordStore` is the seam to the underlying ordered key-value engine.
//! `MemoryRecordStore` keeps records and index entries in BTree structures so
//! iteration order is deterministic.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::expr::field_path_value;

use super::errors::{IndexError, IndexResult};
use super::key::{IndexEntry, IndexKey, IndexTree, TupleRange};
use super::metadata::{IndexColumn, IndexDefinition, RecordMetadata};

/// A stored record
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Record type name
    pub record_type: String,
    /// Primary key value
    pub primary_key: IndexKey,
    /// Record body
    pub body: Arc<Value>,
}

impl StoredRecord {
    /// Returns the record body
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Reads a dotted field path from the body
    pub fn field(&self, path: &str) -> Option<&Value> {
        field_path_value(&self.body, path)
    }
}

/// Boxed record iterator returned by scans
pub type RecordIter<'a> = Box<dyn Iterator<Item = StoredRecord> + 'a>;

/// Boxed index iterator returned by index scans
pub type IndexIter<'a> = Box<dyn Iterator<Item = (IndexEntry, StoredRecord)> + 'a>;

/// Ordered scans over records and indexes.
pub trait RecordStore {
    /// Records of a type in primary key order, strictly after `after`
    fn scan_records<'a>(
        &'a self,
        record_type: &str,
        after: Option<&IndexKey>,
    ) -> IndexResult<RecordIter<'a>>;

    /// Entries of an index within `range` in index order, strictly after `after`
    fn scan_index<'a>(
        &'a self,
        index: &str,
        range: TupleRange,
        after: Option<&IndexEntry>,
    ) -> IndexResult<IndexIter<'a>>;

    /// Loads a record by primary key
    fn load(&self, record_type: &str, primary_key: &IndexKey) -> Option<StoredRecord>;
}

/// In-memory record store with maintained indexes
#[derive(Debug)]
pub struct MemoryRecordStore {
    metadata: RecordMetadata,
    records: BTreeMap<String, BTreeMap<IndexKey, StoredRecord>>,
    indexes: BTreeMap<String, IndexTree>,
}

impl MemoryRecordStore {
    /// Creates an empty store with one empty tree per declared index
    pub fn new(metadata: RecordMetadata) -> Self {
        let indexes = metadata
            .indexes()
            .map(|i| (i.name.clone(), IndexTree::new()))
            .collect();
        Self {
            metadata,
            records: BTreeMap::new(),
            indexes,
        }
    }

    /// Returns the metadata the store was built with
    pub fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    /// Inserts or replaces a record, maintaining every index on its type.
    pub fn insert(&mut self, record_type: &str, body: Value) -> IndexResult<()> {
        let rt = self
            .metadata
            .record_type(record_type)
            .ok_or_else(|| IndexError::unknown_record_type(record_type))?;

        let primary_key = field_path_value(&body, &rt.primary_key)
            .and_then(IndexKey::from_json)
            .filter(|k| !k.is_null())
            .ok_or_else(|| IndexError::invalid_primary_key(record_type, &rt.primary_key))?;

        let record = StoredRecord {
            record_type: record_type.to_string(),
            primary_key: primary_key.clone(),
            body: Arc::new(body),
        };

        let indexes: Vec<IndexDefinition> = self
            .metadata
            .indexes_for(record_type)
            .into_iter()
            .cloned()
            .collect();

        let previous = self
            .records
            .entry(record_type.to_string())
            .or_default()
            .insert(primary_key, record.clone());

        for index in &indexes {
            let tree = self
                .indexes
                .get_mut(&index.name)
                .ok_or_else(|| IndexError::unknown_index(&index.name))?;
            if let Some(old) = &previous {
                for entry in index_entries(index, old) {
                    tree.remove(&entry);
                }
            }
            for entry in index_entries(index, &record) {
                tree.insert(entry);
            }
        }

        Ok(())
    }

    /// Number of records of a type
    pub fn len(&self, record_type: &str) -> usize {
        self.records.get(record_type).map_or(0, |r| r.len())
    }

    /// Number of entries in an index
    pub fn index_len(&self, index: &str) -> usize {
        self.indexes.get(index).map_or(0, |t| t.len())
    }
}

impl RecordStore for MemoryRecordStore {
    fn scan_records<'a>(
        &'a self,
        record_type: &str,
        after: Option<&IndexKey>,
    ) -> IndexResult<RecordIter<'a>> {
        if self.metadata.record_type(record_type).is_none() {
            return Err(IndexError::unknown_record_type(record_type));
        }
        let records = match self.records.get(record_type) {
            Some(r) => r,
            None => return Ok(Box::new(std::iter::empty())),
        };
        let lower = match after {
            Some(pk) => std::ops::Bound::Excluded(pk.clone()),
            None => std::ops::Bound::Unbounded,
        };
        Ok(Box::new(
            records
                .range((lower, std::ops::Bound::Unbounded))
                .map(|(_, r)| r.clone()),
        ))
    }

    fn scan_index<'a>(
        &'a self,
        index: &str,
        range: TupleRange,
        after: Option<&IndexEntry>,
    ) -> IndexResult<IndexIter<'a>> {
        let definition = self
            .metadata
            .index(index)
            .ok_or_else(|| IndexError::unknown_index(index))?;
        let tree = self
            .indexes
            .get(index)
            .ok_or_else(|| IndexError::unknown_index(index))?;
        let records = self.records.get(&definition.record_type);
        Ok(Box::new(tree.scan(range, after).filter_map(move |entry| {
            records
                .and_then(|r| r.get(&entry.primary_key))
                .map(|r| (entry.clone(), r.clone()))
        })))
    }

    fn load(&self, record_type: &str, primary_key: &IndexKey) -> Option<StoredRecord> {
        self.records
            .get(record_type)
            .and_then(|r| r.get(primary_key))
            .cloned()
    }
}

/// Values one column contributes to a record's index entries.
fn column_values(column: &IndexColumn, body: &Value) -> Vec<IndexKey> {
    let value = field_path_value(body, &column.field);
    if column.fan_out {
        match value {
            Some(Value::Array(items)) => items.iter().filter_map(IndexKey::from_json).collect(),
            _ => Vec::new(),
        }
    } else {
        vec![IndexKey::from_optional(value).unwrap_or(IndexKey::Null)]
    }
}

/// All entries an index holds for a record: the cross product of its
/// column values.
fn index_entries(index: &IndexDefinition, record: &StoredRecord) -> Vec<IndexEntry> {
    let mut keys: Vec<Vec<IndexKey>> = vec![Vec::new()];
    for column in &index.columns {
        let values = column_values(column, &record.body);
        keys = keys
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |v| {
                    let mut key = prefix.clone();
                    key.push(v.clone());
                    key
                })
            })
            .collect();
    }
    keys.into_iter()
        .map(|key| IndexEntry::new(key, record.primary_key.clone()))
        .collect()
}
