//! Values: expressions producing a scalar when evaluated against a record

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as Json;

use super::context::EvaluationContext;
use super::correlation::{AliasMap, CorrelationIdentifier};
use super::hashing::{combine_all, hash_json, hash_str};

/// Reads a dotted path such as `header.path` from a JSON object.
pub fn field_path_value<'a>(body: &'a Json, path: &str) -> Option<&'a Json> {
    path.split('.').try_fold(body, |current, segment| current.get(segment))
}

/// An expression over the current record, literals, or correlated bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Field of the record being evaluated
    Field(String),
    /// Field of the record bound to a correlation identifier
    QuantifiedField {
        alias: CorrelationIdentifier,
        path: String,
    },
    /// Constant
    Literal(Json),
    /// The value bound to a correlation identifier
    Correlated(CorrelationIdentifier),
}

impl Value {
    /// Field of the current record
    pub fn field(path: impl Into<String>) -> Arc<Self> {
        Arc::new(Value::Field(path.into()))
    }

    /// Field of a correlated record
    pub fn quantified(alias: CorrelationIdentifier, path: impl Into<String>) -> Arc<Self> {
        Arc::new(Value::QuantifiedField {
            alias,
            path: path.into(),
        })
    }

    /// Constant value
    pub fn literal(value: Json) -> Arc<Self> {
        Arc::new(Value::Literal(value))
    }

    /// Correlated value
    pub fn correlated(id: CorrelationIdentifier) -> Arc<Self> {
        Arc::new(Value::Correlated(id))
    }

    /// Field path of a current-record field
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Value::Field(path) => Some(path),
            _ => None,
        }
    }

    /// Identifiers this value refers to
    pub fn correlated_to(&self) -> BTreeSet<CorrelationIdentifier> {
        let mut ids = BTreeSet::new();
        match self {
            Value::QuantifiedField { alias, .. } => {
                ids.insert(alias.clone());
            }
            Value::Correlated(id) => {
                ids.insert(id.clone());
            }
            Value::Field(_) | Value::Literal(_) => {}
        }
        ids
    }

    /// Renames correlation identifiers through `map`.
    ///
    /// Returns the same `Arc` when nothing is renamed.
    pub fn rebase(self: &Arc<Self>, map: &AliasMap) -> Arc<Self> {
        match self.as_ref() {
            Value::QuantifiedField { alias, path } => match map.get(alias) {
                Some(target) if target != alias => Arc::new(Value::QuantifiedField {
                    alias: target.clone(),
                    path: path.clone(),
                }),
                _ => Arc::clone(self),
            },
            Value::Correlated(id) => match map.get(id) {
                Some(target) if target != id => Arc::new(Value::Correlated(target.clone())),
                _ => Arc::clone(self),
            },
            Value::Field(_) | Value::Literal(_) => Arc::clone(self),
        }
    }

    /// Structural equality with identifiers compared through `map`
    pub fn semantic_equals(&self, other: &Value, map: &AliasMap) -> bool {
        match (self, other) {
            (Value::Field(a), Value::Field(b)) => a == b,
            (Value::Literal(a), Value::Literal(b)) => a == b,
            (Value::Correlated(a), Value::Correlated(b)) => map.matches(a, b),
            (
                Value::QuantifiedField { alias: a, path: pa },
                Value::QuantifiedField { alias: b, path: pb },
            ) => pa == pb && map.matches(a, b),
            _ => false,
        }
    }

    /// Hash consistent with `semantic_equals` under every alias map
    pub fn semantic_hash_code(&self) -> i32 {
        match self {
            Value::Field(path) => combine_all([hash_str("field"), hash_str(path)]),
            Value::QuantifiedField { path, .. } => {
                combine_all([hash_str("quantified_field"), hash_str(path)])
            }
            Value::Literal(v) => combine_all([hash_str("literal"), hash_json(v)]),
            Value::Correlated(_) => hash_str("correlated"),
        }
    }

    /// Evaluates against `record`; `None` when the value is absent.
    pub fn eval(&self, ctx: &EvaluationContext, record: &Json) -> Option<Json> {
        match self {
            Value::Field(path) => field_path_value(record, path).cloned(),
            Value::QuantifiedField { alias, path } => ctx
                .correlation(alias)
                .and_then(|bound| field_path_value(bound, path))
                .cloned(),
            Value::Literal(v) => Some(v.clone()),
            Value::Correlated(id) => ctx.correlation(id).cloned(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Field(path) => write!(f, "{}", path),
            Value::QuantifiedField { alias, path } => write!(f, "{}.{}", alias, path),
            Value::Literal(v) => write!(f, "{}", v),
            Value::Correlated(id) => write!(f, "${}", id),
        }
    }
}
