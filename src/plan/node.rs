//! Physical plan nodes

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::expr::{AliasMap, Comparison, CorrelationIdentifier, QueryPredicate};

/// Values an IN-join iterates
#[derive(Debug, Clone, PartialEq)]
pub enum InSource {
    /// Literal values, sorted ascending at plan time
    Values(Vec<Json>),
    /// A caller-supplied list parameter
    Parameter(String),
}

/// Comparisons an index scan applies to its columns: one equality per
/// leading column, then optional range comparisons on the next column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanComparisons {
    pub equality: Vec<Arc<Comparison>>,
    pub inequality: Vec<Arc<Comparison>>,
}

impl ScanComparisons {
    pub fn is_empty(&self) -> bool {
        self.equality.is_empty() && self.inequality.is_empty()
    }

    /// Number of index columns constrained
    pub fn matched_columns(&self) -> usize {
        self.equality.len() + usize::from(!self.inequality.is_empty())
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<Comparison>> {
        self.equality.iter().chain(self.inequality.iter())
    }
}

/// A physical operator tree.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// Every record of a type in primary key order
    Scan { record_type: String },
    /// A range of an index in index order
    IndexScan {
        index: String,
        comparisons: ScanComparisons,
    },
    /// Child records satisfying every predicate
    Filter {
        child: Arc<QueryPlan>,
        predicates: Vec<Arc<QueryPredicate>>,
    },
    /// Child executed once per source value with `binding` bound to it
    InJoin {
        child: Arc<QueryPlan>,
        binding: CorrelationIdentifier,
        source: InSource,
    },
    /// Merge of ordered children by `comparison_key`, dropping duplicates
    Union {
        children: Vec<Arc<QueryPlan>>,
        comparison_key: Vec<String>,
    },
    /// Children one after another
    UnorderedUnion { children: Vec<Arc<QueryPlan>> },
    /// Child records with already-emitted primary keys removed
    PrimaryKeyDistinct { child: Arc<QueryPlan> },
}

impl QueryPlan {
    pub fn scan(record_type: impl Into<String>) -> Self {
        QueryPlan::Scan {
            record_type: record_type.into(),
        }
    }

    pub fn index_scan(index: impl Into<String>, comparisons: ScanComparisons) -> Self {
        QueryPlan::IndexScan {
            index: index.into(),
            comparisons,
        }
    }

    pub fn filter(child: Arc<QueryPlan>, predicates: Vec<Arc<QueryPredicate>>) -> Self {
        QueryPlan::Filter { child, predicates }
    }

    pub fn in_join(
        child: Arc<QueryPlan>,
        binding: CorrelationIdentifier,
        source: InSource,
    ) -> Self {
        QueryPlan::InJoin {
            child,
            binding,
            source,
        }
    }

    pub fn union(children: Vec<Arc<QueryPlan>>, comparison_key: Vec<String>) -> Self {
        QueryPlan::Union {
            children,
            comparison_key,
        }
    }

    pub fn unordered_union(children: Vec<Arc<QueryPlan>>) -> Self {
        QueryPlan::UnorderedUnion { children }
    }

    pub fn distinct(child: Arc<QueryPlan>) -> Self {
        QueryPlan::PrimaryKeyDistinct { child }
    }

    /// Direct children
    pub fn children(&self) -> Vec<&Arc<QueryPlan>> {
        match self {
            QueryPlan::Scan { .. } | QueryPlan::IndexScan { .. } => Vec::new(),
            QueryPlan::Filter { child, .. }
            | QueryPlan::InJoin { child, .. }
            | QueryPlan::PrimaryKeyDistinct { child } => vec![child],
            QueryPlan::Union { children, .. } | QueryPlan::UnorderedUnion { children } => {
                children.iter().collect()
            }
        }
    }

    /// Identifiers referenced but not bound inside this plan
    pub fn correlated_to(&self) -> BTreeSet<CorrelationIdentifier> {
        match self {
            QueryPlan::Scan { .. } => BTreeSet::new(),
            QueryPlan::IndexScan { comparisons, .. } => comparisons
                .iter()
                .flat_map(|c| c.correlated_to())
                .collect(),
            QueryPlan::Filter { child, predicates } => {
                let mut ids = child.correlated_to();
                for p in predicates {
                    ids.extend(p.correlated_to());
                }
                ids
            }
            QueryPlan::InJoin { child, binding, .. } => {
                let mut ids = child.correlated_to();
                ids.remove(binding);
                ids
            }
            _ => self
                .children()
                .into_iter()
                .flat_map(|c| c.correlated_to())
                .collect(),
        }
    }

    /// True if any node in the tree is an IN-join
    pub fn has_in_join(&self) -> bool {
        matches!(self, QueryPlan::InJoin { .. })
            || self.children().into_iter().any(|c| c.has_in_join())
    }

    /// Structural equality up to renaming of correlation identifiers.
    ///
    /// Bindings introduced by IN-joins are paired while comparing children.
    pub fn semantic_equals(&self, other: &QueryPlan, map: &AliasMap) -> bool {
        match (self, other) {
            (QueryPlan::Scan { record_type: a }, QueryPlan::Scan { record_type: b }) => a == b,
            (
                QueryPlan::IndexScan {
                    index: ia,
                    comparisons: ca,
                },
                QueryPlan::IndexScan {
                    index: ib,
                    comparisons: cb,
                },
            ) => {
                ia == ib
                    && ca.equality.len() == cb.equality.len()
                    && ca.inequality.len() == cb.inequality.len()
                    && ca.iter().zip(cb.iter()).all(|(x, y)| x.semantic_equals(y, map))
            }
            (
                QueryPlan::Filter {
                    child: a,
                    predicates: pa,
                },
                QueryPlan::Filter {
                    child: b,
                    predicates: pb,
                },
            ) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(x, y)| x.semantic_equals(y, map))
                    && a.semantic_equals(b, map)
            }
            (
                QueryPlan::InJoin {
                    child: a,
                    binding: ba,
                    source: sa,
                },
                QueryPlan::InJoin {
                    child: b,
                    binding: bb,
                    source: sb,
                },
            ) => sa == sb && a.semantic_equals(b, &map.clone().with(ba.clone(), bb.clone())),
            (
                QueryPlan::Union {
                    children: a,
                    comparison_key: ka,
                },
                QueryPlan::Union {
                    children: b,
                    comparison_key: kb,
                },
            ) => ka == kb && all_semantic_equals(a, b, map),
            (
                QueryPlan::UnorderedUnion { children: a },
                QueryPlan::UnorderedUnion { children: b },
            ) => all_semantic_equals(a, b, map),
            (
                QueryPlan::PrimaryKeyDistinct { child: a },
                QueryPlan::PrimaryKeyDistinct { child: b },
            ) => a.semantic_equals(b, map),
            _ => false,
        }
    }
}

fn all_semantic_equals(a: &[Arc<QueryPlan>], b: &[Arc<QueryPlan>], map: &AliasMap) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.semantic_equals(y, map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ComparisonType, Field, Operand};
    use serde_json::json;

    fn join_plan(binding: &str) -> QueryPlan {
        let id = CorrelationIdentifier::of(binding);
        let scan = QueryPlan::index_scan(
            "by_num",
            ScanComparisons {
                equality: vec![Comparison::equals_correlation(id.clone())],
                inequality: vec![],
            },
        );
        QueryPlan::in_join(
            Arc::new(scan),
            id,
            InSource::Values(vec![json!(1), json!(2)]),
        )
    }

    #[test]
    fn test_correlations_bound_by_join() {
        let plan = join_plan("__in_num__0");
        assert!(plan.correlated_to().is_empty());
        assert_eq!(plan.children()[0].correlated_to().len(), 1);
        assert!(plan.has_in_join());
    }

    #[test]
    fn test_semantic_equals_pairs_join_bindings() {
        let a = join_plan("x");
        let b = join_plan("y");
        assert!(a.semantic_equals(&b, &AliasMap::identity()));
        assert_ne!(a, b);

        let filtered = QueryPlan::filter(
            Arc::new(QueryPlan::scan("MyRecord")),
            vec![Field::new("num").equals(json!(1))],
        );
        assert!(!a.semantic_equals(&filtered, &AliasMap::identity()));
    }

    #[test]
    fn test_matched_columns() {
        let comparisons = ScanComparisons {
            equality: vec![Comparison::equals(json!(1))],
            inequality: vec![
                Comparison::new(ComparisonType::GreaterThan, Operand::Literal(json!(1))),
                Comparison::new(ComparisonType::LessThan, Operand::Literal(json!(9))),
            ],
        };
        assert_eq!(comparisons.matched_columns(), 2);
        assert!(ScanComparisons::default().is_empty());
    }
}
