//! Query predicates and field builders

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as Json;

use super::comparison::{Comparison, ComparisonType, Operand};
use super::context::EvaluationContext;
use super::correlation::{AliasMap, CorrelationIdentifier};
use super::errors::EvalResult;
use super::hashing::{combine_all, hash_str};
use super::value::{field_path_value, Value};

/// A comparison applied to a value
#[derive(Debug, Clone, PartialEq)]
pub struct ValuePredicate {
    pub value: Arc<Value>,
    pub comparison: Arc<Comparison>,
}

/// True when any element of a repeated field satisfies the comparison
#[derive(Debug, Clone, PartialEq)]
pub struct OneOfThemPredicate {
    pub field: String,
    pub comparison: Arc<Comparison>,
}

/// Boolean predicate over a record, evaluated with three-valued logic.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPredicate {
    Value(ValuePredicate),
    And(Vec<Arc<QueryPredicate>>),
    Or(Vec<Arc<QueryPredicate>>),
    Not(Arc<QueryPredicate>),
    OneOfThem(OneOfThemPredicate),
}

impl QueryPredicate {
    /// `value comparison`
    pub fn value(value: Arc<Value>, comparison: Arc<Comparison>) -> Arc<Self> {
        Arc::new(QueryPredicate::Value(ValuePredicate { value, comparison }))
    }

    /// Conjunction
    pub fn and(children: Vec<Arc<QueryPredicate>>) -> Arc<Self> {
        Arc::new(QueryPredicate::And(children))
    }

    /// Disjunction
    pub fn or(children: Vec<Arc<QueryPredicate>>) -> Arc<Self> {
        Arc::new(QueryPredicate::Or(children))
    }

    /// Negation
    pub fn not(child: Arc<QueryPredicate>) -> Arc<Self> {
        Arc::new(QueryPredicate::Not(child))
    }

    /// Flattens nested conjunctions into a list of conjuncts
    pub fn conjuncts(self: &Arc<Self>) -> Vec<Arc<Self>> {
        match self.as_ref() {
            QueryPredicate::And(children) => children.iter().flat_map(|c| c.conjuncts()).collect(),
            _ => vec![Arc::clone(self)],
        }
    }

    /// Identifiers this predicate refers to
    pub fn correlated_to(&self) -> BTreeSet<CorrelationIdentifier> {
        match self {
            QueryPredicate::Value(p) => {
                let mut ids = p.value.correlated_to();
                ids.extend(p.comparison.correlated_to());
                ids
            }
            QueryPredicate::And(children) | QueryPredicate::Or(children) => children
                .iter()
                .flat_map(|c| c.correlated_to())
                .collect(),
            QueryPredicate::Not(child) => child.correlated_to(),
            QueryPredicate::OneOfThem(p) => p.comparison.correlated_to(),
        }
    }

    /// Renames correlation identifiers; the same `Arc` when nothing changes.
    pub fn rebase(self: &Arc<Self>, map: &AliasMap) -> Arc<Self> {
        match self.as_ref() {
            QueryPredicate::Value(p) => {
                let value = p.value.rebase(map);
                let comparison = p.comparison.rebase(map);
                if Arc::ptr_eq(&value, &p.value) && Arc::ptr_eq(&comparison, &p.comparison) {
                    Arc::clone(self)
                } else {
                    QueryPredicate::value(value, comparison)
                }
            }
            QueryPredicate::And(children) => match rebase_all(children, map) {
                Some(rebased) => QueryPredicate::and(rebased),
                None => Arc::clone(self),
            },
            QueryPredicate::Or(children) => match rebase_all(children, map) {
                Some(rebased) => QueryPredicate::or(rebased),
                None => Arc::clone(self),
            },
            QueryPredicate::Not(child) => {
                let rebased = child.rebase(map);
                if Arc::ptr_eq(&rebased, child) {
                    Arc::clone(self)
                } else {
                    QueryPredicate::not(rebased)
                }
            }
            QueryPredicate::OneOfThem(p) => {
                let comparison = p.comparison.rebase(map);
                if Arc::ptr_eq(&comparison, &p.comparison) {
                    Arc::clone(self)
                } else {
                    Arc::new(QueryPredicate::OneOfThem(OneOfThemPredicate {
                        field: p.field.clone(),
                        comparison,
                    }))
                }
            }
        }
    }

    /// Structural equality with identifiers compared through `map`
    pub fn semantic_equals(&self, other: &QueryPredicate, map: &AliasMap) -> bool {
        match (self, other) {
            (QueryPredicate::Value(a), QueryPredicate::Value(b)) => {
                a.value.semantic_equals(&b.value, map)
                    && a.comparison.semantic_equals(&b.comparison, map)
            }
            (QueryPredicate::And(a), QueryPredicate::And(b))
            | (QueryPredicate::Or(a), QueryPredicate::Or(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.semantic_equals(y, map))
            }
            (QueryPredicate::Not(a), QueryPredicate::Not(b)) => a.semantic_equals(b, map),
            (QueryPredicate::OneOfThem(a), QueryPredicate::OneOfThem(b)) => {
                a.field == b.field && a.comparison.semantic_equals(&b.comparison, map)
            }
            _ => false,
        }
    }

    /// Hash consistent with `semantic_equals`; never reads identifier names.
    pub fn semantic_hash_code(&self) -> i32 {
        match self {
            QueryPredicate::Value(p) => combine_all([
                hash_str("value"),
                p.value.semantic_hash_code(),
                p.comparison.semantic_hash_code(),
            ]),
            QueryPredicate::And(children) => combine_all(
                std::iter::once(hash_str("and"))
                    .chain(children.iter().map(|c| c.semantic_hash_code())),
            ),
            QueryPredicate::Or(children) => combine_all(
                std::iter::once(hash_str("or"))
                    .chain(children.iter().map(|c| c.semantic_hash_code())),
            ),
            QueryPredicate::Not(child) => {
                combine_all([hash_str("not"), child.semantic_hash_code()])
            }
            QueryPredicate::OneOfThem(p) => combine_all([
                hash_str("one_of_them"),
                hash_str(&p.field),
                p.comparison.semantic_hash_code(),
            ]),
        }
    }

    /// Evaluates against `record`. `Ok(None)` is unknown.
    pub fn eval(&self, ctx: &EvaluationContext, record: &Json) -> EvalResult<Option<bool>> {
        match self {
            QueryPredicate::Value(p) => {
                let value = p.value.eval(ctx, record);
                p.comparison.eval(ctx, value.as_ref())
            }
            QueryPredicate::And(children) => {
                let mut result = Some(true);
                for child in children {
                    match child.eval(ctx, record)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }
            QueryPredicate::Or(children) => {
                let mut result = Some(false);
                for child in children {
                    match child.eval(ctx, record)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(result)
            }
            QueryPredicate::Not(child) => Ok(child.eval(ctx, record)?.map(|b| !b)),
            QueryPredicate::OneOfThem(p) => {
                let items = match field_path_value(record, &p.field) {
                    Some(Json::Array(items)) => items,
                    _ => return Ok(None),
                };
                let mut result = Some(false);
                for item in items {
                    match p.comparison.eval(ctx, Some(item))? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(result)
            }
        }
    }
}

/// Rebases every child; `None` when no child changed.
fn rebase_all(
    children: &[Arc<QueryPredicate>],
    map: &AliasMap,
) -> Option<Vec<Arc<QueryPredicate>>> {
    let rebased: Vec<_> = children.iter().map(|c| c.rebase(map)).collect();
    let changed = rebased
        .iter()
        .zip(children)
        .any(|(new, old)| !Arc::ptr_eq(new, old));
    changed.then_some(rebased)
}

impl fmt::Display for QueryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPredicate::Value(p) => write!(f, "{} {}", p.value, p.comparison),
            QueryPredicate::And(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" AND "))
            }
            QueryPredicate::Or(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(" OR "))
            }
            QueryPredicate::Not(child) => write!(f, "NOT ({})", child),
            QueryPredicate::OneOfThem(p) => write!(f, "one of {} {}", p.field, p.comparison),
        }
    }
}

/// Builder for predicates over a field of the current record.
#[derive(Debug, Clone)]
pub struct Field(String);

impl Field {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// `field comparison`
    pub fn matches(&self, comparison: Arc<Comparison>) -> Arc<QueryPredicate> {
        QueryPredicate::value(Value::field(self.0.clone()), comparison)
    }

    fn compare(&self, op: ComparisonType, value: Json) -> Arc<QueryPredicate> {
        self.matches(Comparison::new(op, Operand::Literal(value)))
    }

    pub fn equals(&self, value: Json) -> Arc<QueryPredicate> {
        self.compare(ComparisonType::Equals, value)
    }

    pub fn not_equals(&self, value: Json) -> Arc<QueryPredicate> {
        self.compare(ComparisonType::NotEquals, value)
    }

    pub fn less_than(&self, value: Json) -> Arc<QueryPredicate> {
        self.compare(ComparisonType::LessThan, value)
    }

    pub fn less_than_or_equals(&self, value: Json) -> Arc<QueryPredicate> {
        self.compare(ComparisonType::LessThanOrEquals, value)
    }

    pub fn greater_than(&self, value: Json) -> Arc<QueryPredicate> {
        self.compare(ComparisonType::GreaterThan, value)
    }

    pub fn greater_than_or_equals(&self, value: Json) -> Arc<QueryPredicate> {
        self.compare(ComparisonType::GreaterThanOrEquals, value)
    }

    /// `field = $name`
    pub fn equals_parameter(&self, name: impl Into<String>) -> Arc<QueryPredicate> {
        self.matches(Comparison::new(
            ComparisonType::Equals,
            Operand::Parameter(name.into()),
        ))
    }

    pub fn in_list(&self, values: Vec<Json>) -> Arc<QueryPredicate> {
        self.matches(Comparison::in_list(values))
    }

    pub fn in_parameter(&self, name: impl Into<String>) -> Arc<QueryPredicate> {
        self.matches(Comparison::in_parameter(name))
    }

    pub fn is_null(&self) -> Arc<QueryPredicate> {
        self.matches(Comparison::new(ComparisonType::IsNull, Operand::None))
    }

    /// Any element of the repeated field satisfies `comparison`
    pub fn one_of_them(&self, comparison: Arc<Comparison>) -> Arc<QueryPredicate> {
        Arc::new(QueryPredicate::OneOfThem(OneOfThemPredicate {
            field: self.0.clone(),
            comparison,
        }))
    }
}
