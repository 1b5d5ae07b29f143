//! Index oracle consulted by the planner

use crate::index::{IndexDefinition, MemoryRecordStore, RecordMetadata, RecordType};

/// Read-only view of record types and their indexes.
///
/// Implementations must be pure: the planner may ask the same question many
/// times while planning one query.
pub trait IndexCatalog {
    /// Looks up a record type
    fn record_type(&self, name: &str) -> Option<&RecordType>;

    /// Indexes on a record type, ordered by name
    fn indexes_for(&self, record_type: &str) -> Vec<&IndexDefinition>;

    /// Indexes on a record type with a column over `field`, ordered by name
    fn candidate_indexes(&self, record_type: &str, field: &str) -> Vec<&IndexDefinition> {
        self.indexes_for(record_type)
            .into_iter()
            .filter(|index| index.covers(field))
            .collect()
    }
}

impl IndexCatalog for RecordMetadata {
    fn record_type(&self, name: &str) -> Option<&RecordType> {
        RecordMetadata::record_type(self, name)
    }

    fn indexes_for(&self, record_type: &str) -> Vec<&IndexDefinition> {
        RecordMetadata::indexes_for(self, record_type)
    }
}

impl IndexCatalog for MemoryRecordStore {
    fn record_type(&self, name: &str) -> Option<&RecordType> {
        self.metadata().record_type(name)
    }

    fn indexes_for(&self, record_type: &str) -> Vec<&IndexDefinition> {
        self.metadata().indexes_for(record_type)
    }
}
