//! Result types for query execution

use crate::index::StoredRecord;

/// Result of one execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Records in plan order
    pub records: Vec<StoredRecord>,
    /// Records fetched from the store
    pub scanned_count: usize,
    /// Fetched records rejected by residual filters
    pub discarded_count: usize,
    /// Resumes after the last returned record; `None` when exhausted
    pub continuation: Option<Vec<u8>>,
}

impl ExecutionResult {
    /// Creates an empty result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if no records were returned
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records returned
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Iterates over returned records
    pub fn iter(&self) -> impl Iterator<Item = &StoredRecord> {
        self.records.iter()
    }

    /// Returns true if more records may follow
    pub fn has_more(&self) -> bool {
        self.continuation.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexKey;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_empty_result() {
        let result = ExecutionResult::empty();
        assert!(result.is_empty());
        assert_eq!(result.len(), 0);
        assert!(!result.has_more());
    }

    #[test]
    fn test_result_iteration() {
        let record = StoredRecord {
            record_type: "MyRecord".into(),
            primary_key: IndexKey::Int(1),
            body: Arc::new(json!({"rec_no": 1})),
        };
        let result = ExecutionResult {
            records: vec![record.clone()],
            scanned_count: 3,
            discarded_count: 2,
            continuation: Some(vec![0]),
        };
        assert_eq!(result.len(), 1);
        assert_eq!(result.iter().next(), Some(&record));
        assert!(result.has_more());
    }
}
