//! Plan hashing
//!
//! Three deterministic folds over plan and predicate trees:
//!
//! - `Legacy`: every literal and structural detail
//! - `ForContinuation`: omits what may differ between the plan that produced
//!   a continuation and the plan resuming it, namely IN-join value lists
//! - `StructuralWithoutLiterals`: operator shape and field references only
//!
//! None of them reads correlation identifier names, so plans that are
//! semantically equal under an alias map hash equally.

use crate::expr::hashing::{combine, combine_all, hash_json, hash_str};
use crate::expr::{Comparison, Operand, QueryPredicate, Value};

use super::node::{InSource, QueryPlan};

/// Which details a plan hash covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanHashKind {
    Legacy,
    ForContinuation,
    StructuralWithoutLiterals,
}

/// Anything with a plan hash
pub trait PlanHashable {
    fn plan_hash(&self, kind: PlanHashKind) -> i32;
}

fn literal_hash(value: &serde_json::Value, kind: PlanHashKind) -> i32 {
    match kind {
        PlanHashKind::StructuralWithoutLiterals => hash_str("literal"),
        PlanHashKind::Legacy | PlanHashKind::ForContinuation => hash_json(value),
    }
}

fn hash_many<'a, T: PlanHashable + 'a>(
    seed: &str,
    items: impl IntoIterator<Item = &'a T>,
    kind: PlanHashKind,
) -> i32 {
    items
        .into_iter()
        .fold(hash_str(seed), |h, item| combine(h, item.plan_hash(kind)))
}

impl<T: PlanHashable + ?Sized> PlanHashable for std::sync::Arc<T> {
    fn plan_hash(&self, kind: PlanHashKind) -> i32 {
        (**self).plan_hash(kind)
    }
}

impl PlanHashable for Value {
    fn plan_hash(&self, kind: PlanHashKind) -> i32 {
        match self {
            Value::Field(path) => combine_all([hash_str("field"), hash_str(path)]),
            Value::QuantifiedField { path, .. } => {
                combine_all([hash_str("quantified_field"), hash_str(path)])
            }
            Value::Literal(v) => combine_all([hash_str("literal_value"), literal_hash(v, kind)]),
            Value::Correlated(_) => hash_str("correlated"),
        }
    }
}

impl PlanHashable for Comparison {
    fn plan_hash(&self, kind: PlanHashKind) -> i32 {
        let operand = match &self.operand {
            Operand::None => 0,
            Operand::Literal(v) => literal_hash(v, kind),
            Operand::LiteralList(values) => match kind {
                PlanHashKind::StructuralWithoutLiterals => hash_str("literal_list"),
                _ => combine_all(values.iter().map(|v| literal_hash(v, kind))),
            },
            Operand::Parameter(name) => combine(hash_str("parameter"), hash_str(name)),
            Operand::Correlation(_) => hash_str("correlation"),
        };
        combine_all([hash_str(self.op.name()), operand])
    }
}

impl PlanHashable for QueryPredicate {
    fn plan_hash(&self, kind: PlanHashKind) -> i32 {
        match self {
            QueryPredicate::Value(p) => combine_all([
                hash_str("value_predicate"),
                p.value.plan_hash(kind),
                p.comparison.plan_hash(kind),
            ]),
            QueryPredicate::And(children) => hash_many("and", children, kind),
            QueryPredicate::Or(children) => hash_many("or", children, kind),
            QueryPredicate::Not(child) => combine(hash_str("not"), child.plan_hash(kind)),
            QueryPredicate::OneOfThem(p) => combine_all([
                hash_str("one_of_them"),
                hash_str(&p.field),
                p.comparison.plan_hash(kind),
            ]),
        }
    }
}

impl PlanHashable for InSource {
    fn plan_hash(&self, kind: PlanHashKind) -> i32 {
        match self {
            InSource::Values(values) => match kind {
                PlanHashKind::Legacy => combine_all(
                    std::iter::once(hash_str("values")).chain(values.iter().map(hash_json)),
                ),
                PlanHashKind::ForContinuation | PlanHashKind::StructuralWithoutLiterals => {
                    hash_str("values")
                }
            },
            InSource::Parameter(name) => combine(hash_str("parameter"), hash_str(name)),
        }
    }
}

impl PlanHashable for QueryPlan {
    fn plan_hash(&self, kind: PlanHashKind) -> i32 {
        match self {
            QueryPlan::Scan { record_type } => combine(hash_str("scan"), hash_str(record_type)),
            QueryPlan::IndexScan { index, comparisons } => combine_all([
                hash_str("index_scan"),
                hash_str(index),
                hash_many("equality", &comparisons.equality, kind),
                hash_many("inequality", &comparisons.inequality, kind),
            ]),
            QueryPlan::Filter { child, predicates } => combine_all([
                hash_str("filter"),
                child.plan_hash(kind),
                hash_many("predicates", predicates, kind),
            ]),
            QueryPlan::InJoin { child, source, .. } => combine_all([
                hash_str("in_join"),
                child.plan_hash(kind),
                source.plan_hash(kind),
            ]),
            QueryPlan::Union {
                children,
                comparison_key,
            } => combine_all(
                [hash_str("union"), hash_many("children", children, kind)]
                    .into_iter()
                    .chain(comparison_key.iter().map(|k| hash_str(k))),
            ),
            QueryPlan::UnorderedUnion { children } => combine(
                hash_str("unordered_union"),
                hash_many("children", children, kind),
            ),
            QueryPlan::PrimaryKeyDistinct { child } => {
                combine(hash_str("primary_key_distinct"), child.plan_hash(kind))
            }
        }
    }
}
