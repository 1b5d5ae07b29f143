//! Evaluation context: parameter and correlation bindings

use std::collections::BTreeMap;

use serde_json::Value;

use super::correlation::CorrelationIdentifier;

/// Bindings visible while evaluating values and predicates.
///
/// Parameters are supplied by the caller; correlations are bound by
/// enclosing operators such as an IN-join.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    parameters: BTreeMap<String, Value>,
    correlations: BTreeMap<CorrelationIdentifier, Value>,
}

impl EvaluationContext {
    /// Context without bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a named parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Value bound to a named parameter, `None` when unbound
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Copy of this context with `id` bound to `value`
    pub fn with_correlation(&self, id: CorrelationIdentifier, value: Value) -> Self {
        let mut ctx = self.clone();
        ctx.correlations.insert(id, value);
        ctx
    }

    /// Value bound to a correlation identifier
    pub fn correlation(&self, id: &CorrelationIdentifier) -> Option<&Value> {
        self.correlations.get(id)
    }
}
