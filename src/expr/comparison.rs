//! Comparisons: an operator plus an operand, evaluated three-valued

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::index::compare_json;

use super::context::EvaluationContext;
use super::correlation::{AliasMap, CorrelationIdentifier};
use super::errors::{EvalError, EvalResult};
use super::hashing::{combine_all, hash_json, hash_str};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComparisonType {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    In,
    IsNull,
    NotNull,
}

impl ComparisonType {
    /// Stable name used in explain output and hashing
    pub fn name(&self) -> &'static str {
        match self {
            ComparisonType::Equals => "EQUALS",
            ComparisonType::NotEquals => "NOT_EQUALS",
            ComparisonType::LessThan => "LESS_THAN",
            ComparisonType::LessThanOrEquals => "LESS_THAN_OR_EQUALS",
            ComparisonType::GreaterThan => "GREATER_THAN",
            ComparisonType::GreaterThanOrEquals => "GREATER_THAN_OR_EQUALS",
            ComparisonType::In => "IN",
            ComparisonType::IsNull => "IS_NULL",
            ComparisonType::NotNull => "NOT_NULL",
        }
    }

    /// `<`, `<=`, `>` or `>=`
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            ComparisonType::LessThan
                | ComparisonType::LessThanOrEquals
                | ComparisonType::GreaterThan
                | ComparisonType::GreaterThanOrEquals
        )
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand (`IS NULL`, `IS NOT NULL`)
    None,
    /// A scalar constant
    Literal(Json),
    /// A constant list, for `IN`
    LiteralList(Vec<Json>),
    /// A caller-supplied parameter
    Parameter(String),
    /// A value bound by an enclosing operator
    Correlation(CorrelationIdentifier),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::LiteralList(values) => write!(f, "{}", format_list(values)),
            Operand::Parameter(name) => write!(f, "${}", name),
            Operand::Correlation(id) => write!(f, "${}", id),
        }
    }
}

/// Renders a list as `[1, 2, 4]`
pub fn format_list(values: &[Json]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

/// An operator applied to an operand
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: ComparisonType,
    pub operand: Operand,
}

impl Comparison {
    pub fn new(op: ComparisonType, operand: Operand) -> Arc<Self> {
        Arc::new(Self { op, operand })
    }

    /// `= value`
    pub fn equals(value: Json) -> Arc<Self> {
        Self::new(ComparisonType::Equals, Operand::Literal(value))
    }

    /// `= $id`
    pub fn equals_correlation(id: CorrelationIdentifier) -> Arc<Self> {
        Self::new(ComparisonType::Equals, Operand::Correlation(id))
    }

    /// `IN [values]`
    pub fn in_list(values: Vec<Json>) -> Arc<Self> {
        Self::new(ComparisonType::In, Operand::LiteralList(values))
    }

    /// `IN $name`
    pub fn in_parameter(name: impl Into<String>) -> Arc<Self> {
        Self::new(ComparisonType::In, Operand::Parameter(name.into()))
    }

    /// Identifiers this comparison refers to
    pub fn correlated_to(&self) -> BTreeSet<CorrelationIdentifier> {
        match &self.operand {
            Operand::Correlation(id) => BTreeSet::from([id.clone()]),
            _ => BTreeSet::new(),
        }
    }

    /// Renames correlation identifiers; the same `Arc` when nothing changes.
    pub fn rebase(self: &Arc<Self>, map: &AliasMap) -> Arc<Self> {
        match &self.operand {
            Operand::Correlation(id) => match map.get(id) {
                Some(target) if target != id => {
                    Self::new(self.op, Operand::Correlation(target.clone()))
                }
                _ => Arc::clone(self),
            },
            _ => Arc::clone(self),
        }
    }

    /// Structural equality with identifiers compared through `map`
    pub fn semantic_equals(&self, other: &Comparison, map: &AliasMap) -> bool {
        if self.op != other.op {
            return false;
        }
        match (&self.operand, &other.operand) {
            (Operand::Correlation(a), Operand::Correlation(b)) => map.matches(a, b),
            (a, b) => a == b,
        }
    }

    /// Hash consistent with `semantic_equals`
    pub fn semantic_hash_code(&self) -> i32 {
        let operand = match &self.operand {
            Operand::None => 0,
            Operand::Literal(v) => hash_json(v),
            Operand::LiteralList(values) => combine_all(values.iter().map(hash_json)),
            Operand::Parameter(name) => hash_str(name),
            Operand::Correlation(_) => hash_str("correlation"),
        };
        combine_all([hash_str(self.op.name()), operand])
    }

    /// Scalar operand value, `None` when unbound.
    pub fn resolve_scalar<'a>(&'a self, ctx: &'a EvaluationContext) -> Option<&'a Json> {
        match &self.operand {
            Operand::Literal(v) => Some(v),
            Operand::Parameter(name) => ctx.parameter(name),
            Operand::Correlation(id) => ctx.correlation(id),
            Operand::None | Operand::LiteralList(_) => None,
        }
    }

    /// List operand for `IN`; `None` when unbound or bound to null.
    pub fn resolve_list<'a>(
        &'a self,
        ctx: &'a EvaluationContext,
    ) -> EvalResult<Option<&'a [Json]>> {
        match &self.operand {
            Operand::LiteralList(values) => Ok(Some(values.as_slice())),
            Operand::Parameter(name) => match ctx.parameter(name) {
                None | Some(Json::Null) => Ok(None),
                Some(Json::Array(values)) => Ok(Some(values.as_slice())),
                Some(other) => Err(EvalError::ParameterNotAList {
                    name: name.clone(),
                    found: other.to_string(),
                }),
            },
            Operand::Correlation(id) => match ctx.correlation(id) {
                None | Some(Json::Null) => Ok(None),
                Some(Json::Array(values)) => Ok(Some(values.as_slice())),
                Some(other) => Err(EvalError::CorrelationNotAList {
                    name: id.to_string(),
                    found: other.to_string(),
                }),
            },
            Operand::None | Operand::Literal(_) => Ok(None),
        }
    }

    /// Applies the comparison to `value`.
    ///
    /// `Ok(None)` is unknown: the value is absent or null, or the operand is
    /// unbound.
    pub fn eval(&self, ctx: &EvaluationContext, value: Option<&Json>) -> EvalResult<Option<bool>> {
        let value = value.filter(|v| !v.is_null());
        match self.op {
            ComparisonType::IsNull => return Ok(Some(value.is_none())),
            ComparisonType::NotNull => return Ok(Some(value.is_some())),
            _ => {}
        }
        let value = match value {
            Some(v) => v,
            None => return Ok(None),
        };

        if self.op == ComparisonType::In {
            return Ok(self
                .resolve_list(ctx)?
                .map(|list| list.iter().any(|c| compare_json(value, c) == Ordering::Equal)));
        }

        let operand = match self.resolve_scalar(ctx) {
            Some(o) if !o.is_null() => o,
            _ => return Ok(None),
        };
        let ord = compare_json(value, operand);
        let result = match self.op {
            ComparisonType::Equals => ord == Ordering::Equal,
            ComparisonType::NotEquals => ord != Ordering::Equal,
            ComparisonType::LessThan => ord == Ordering::Less,
            ComparisonType::LessThanOrEquals => ord != Ordering::Greater,
            ComparisonType::GreaterThan => ord == Ordering::Greater,
            ComparisonType::GreaterThanOrEquals => ord != Ordering::Less,
            ComparisonType::In | ComparisonType::IsNull | ComparisonType::NotNull => false,
        };
        Ok(Some(result))
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::None => write!(f, "{}", self.op.name()),
            _ => write!(f, "{} {}", self.op.name(), self.operand),
        }
    }
}
