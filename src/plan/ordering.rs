//! Output ordering of a plan

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::expr::Comparison;

/// The order a plan produces records in.
///
/// Records are sorted lexicographically by `keys`, which always end with the
/// primary key field. Fields in `equality_bound` hold a single value across
/// the whole output, so they never constrain a requested sort.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanOrdering {
    pub keys: Vec<String>,
    pub equality_bound: BTreeMap<String, Arc<Comparison>>,
}

impl PlanOrdering {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            equality_bound: BTreeMap::new(),
        }
    }

    pub fn with_bound(mut self, field: impl Into<String>, comparison: Arc<Comparison>) -> Self {
        self.equality_bound.insert(field.into(), comparison);
        self
    }

    /// Keys that actually vary across the output
    pub fn free_keys(&self) -> Vec<String> {
        self.keys
            .iter()
            .filter(|k| !self.equality_bound.contains_key(*k))
            .cloned()
            .collect()
    }

    /// True if records come out sorted by `sort`
    pub fn satisfies(&self, sort: &[String]) -> bool {
        let free = self.free_keys();
        let required: Vec<&String> = sort
            .iter()
            .filter(|s| !self.equality_bound.contains_key(*s))
            .collect();
        required.len() <= free.len() && free.iter().zip(required).all(|(a, b)| a == b)
    }

    /// Ordering after an IN-join over `field`: the join value varies
    /// outermost, ascending.
    pub fn joined_over(&self, field: &str) -> Self {
        let mut keys = vec![field.to_string()];
        keys.extend(self.keys.iter().filter(|k| *k != field).cloned());
        let mut equality_bound = self.equality_bound.clone();
        equality_bound.remove(field);
        Self {
            keys,
            equality_bound,
        }
    }

    /// Common ordering of union branches.
    ///
    /// `None` unless every branch varies over the same keys; fields bound to
    /// the same comparison in every branch stay bound.
    pub fn merged(branches: &[PlanOrdering]) -> Option<PlanOrdering> {
        let (first, rest) = branches.split_first()?;
        let keys = first.free_keys();
        if rest.iter().any(|o| o.free_keys() != keys) {
            return None;
        }
        let equality_bound = first
            .equality_bound
            .iter()
            .filter(|(field, cmp)| {
                rest.iter()
                    .all(|o| o.equality_bound.get(*field) == Some(*cmp))
            })
            .map(|(f, c)| (f.clone(), c.clone()))
            .collect();
        Some(Self {
            keys,
            equality_bound,
        })
    }
}
