//! Query definition
//!
//! A query names one record type, an optional filter and an optional sort.
//! Sort fields are ascending; the primary key breaks ties implicitly.

use std::sync::Arc;

use crate::expr::QueryPredicate;

/// A query over one record type
#[derive(Debug, Clone)]
pub struct Query {
    /// Record type to read
    pub record_type: String,
    /// Filter predicate
    pub filter: Option<Arc<QueryPredicate>>,
    /// Required output order, ascending by each field in turn
    pub sort: Vec<String>,
}

impl Query {
    /// Creates a query returning every record of a type
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            filter: None,
            sort: Vec::new(),
        }
    }

    /// Sets the filter
    pub fn with_filter(mut self, filter: Arc<QueryPredicate>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the required sort
    pub fn with_sort<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.sort = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Top-level conjuncts of the filter
    pub fn conjuncts(&self) -> Vec<Arc<QueryPredicate>> {
        self.filter.as_ref().map(|f| f.conjuncts()).unwrap_or_default()
    }
}
