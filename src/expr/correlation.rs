//! Correlation identifiers and alias maps

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name through which a sub-expression refers to a value bound by an
/// enclosing operator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorrelationIdentifier(String);

impl CorrelationIdentifier {
    /// Identifier with the given name
    pub fn of(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identifier for the `n`th IN binding over `field`, e.g. `__in_num__0`.
    ///
    /// Dots in nested paths become underscores.
    pub fn in_binding(field: &str, n: usize) -> Self {
        Self(format!("__in_{}__{}", field.replace('.', "_"), n))
    }

    /// Returns the identifier name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bijection between source-side and target-side correlation identifiers.
///
/// Identifiers absent from the map are compared for plain equality, except
/// that an unmapped source may not equal an identifier already used as a
/// mapping target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    forward: BTreeMap<CorrelationIdentifier, CorrelationIdentifier>,
    reverse: BTreeMap<CorrelationIdentifier, CorrelationIdentifier>,
}

impl AliasMap {
    /// The empty map; identifiers match only themselves.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Map with a single pair
    pub fn of(source: CorrelationIdentifier, target: CorrelationIdentifier) -> Self {
        Self::identity().with(source, target)
    }

    /// Adds a pair, replacing any pair that shares either side.
    pub fn with(mut self, source: CorrelationIdentifier, target: CorrelationIdentifier) -> Self {
        if let Some(old_target) = self.forward.remove(&source) {
            self.reverse.remove(&old_target);
        }
        if let Some(old_source) = self.reverse.remove(&target) {
            self.forward.remove(&old_source);
        }
        self.forward.insert(source.clone(), target.clone());
        self.reverse.insert(target, source);
        self
    }

    /// Target for a source identifier
    pub fn get(&self, source: &CorrelationIdentifier) -> Option<&CorrelationIdentifier> {
        self.forward.get(source)
    }

    /// True if `id` is the target of some pair
    pub fn is_target(&self, id: &CorrelationIdentifier) -> bool {
        self.reverse.contains_key(id)
    }

    /// The same pairs read target-to-source
    pub fn inverse(&self) -> Self {
        Self {
            forward: self.reverse.clone(),
            reverse: self.forward.clone(),
        }
    }

    /// True if `source` on the left corresponds to `target` on the right.
    pub fn matches(&self, source: &CorrelationIdentifier, target: &CorrelationIdentifier) -> bool {
        match self.forward.get(source) {
            Some(mapped) => mapped == target,
            None => source == target && !self.is_target(target),
        }
    }

    /// Target for `id`, or `id` itself when unmapped
    pub fn map<'a>(&'a self, id: &'a CorrelationIdentifier) -> &'a CorrelationIdentifier {
        self.forward.get(id).unwrap_or(id)
    }

    /// Returns true if the map has no pairs
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.forward.len()
    }
}
