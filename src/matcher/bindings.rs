//! Bindable objects and the planner bindings accumulator

use std::collections::BTreeMap;
use std::iter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value as Json;

use crate::expr::{Comparison, QueryPredicate, Value};
use crate::plan::QueryPlan;

use super::memo::{GroupId, Memo, RelationalExpression};

/// Identity of a matcher; the key under which it records bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatcherId(u64);

static NEXT_MATCHER_ID: AtomicU64 = AtomicU64::new(1);

impl MatcherId {
    /// Allocates a process-unique id
    pub fn next() -> Self {
        Self(NEXT_MATCHER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Anything a matcher can bind against.
#[derive(Debug, Clone, PartialEq)]
pub enum Bindable {
    Predicate(Arc<QueryPredicate>),
    Value(Arc<Value>),
    Comparison(Arc<Comparison>),
    Plan(Arc<QueryPlan>),
    /// A memo group
    Ref(GroupId),
    /// A logical member of a memo group
    Expression(RelationalExpression),
    Scalar(Json),
    List(Arc<[Bindable]>),
    /// The members of a memo group, read from the memo on demand
    Members { group: GroupId, plans_only: bool },
}

/// Runtime kind of a `Bindable`, used as a matcher's root type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindableKind {
    Predicate,
    Value,
    Comparison,
    Plan,
    Ref,
    Expression,
    Scalar,
    List,
}

impl Bindable {
    /// Kind tag of this object
    pub fn kind(&self) -> BindableKind {
        match self {
            Bindable::Predicate(_) => BindableKind::Predicate,
            Bindable::Value(_) => BindableKind::Value,
            Bindable::Comparison(_) => BindableKind::Comparison,
            Bindable::Plan(_) => BindableKind::Plan,
            Bindable::Ref(_) => BindableKind::Ref,
            Bindable::Expression(_) => BindableKind::Expression,
            Bindable::Scalar(_) => BindableKind::Scalar,
            Bindable::List(_) | Bindable::Members { .. } => BindableKind::List,
        }
    }

    pub fn as_predicate(&self) -> Option<&Arc<QueryPredicate>> {
        match self {
            Bindable::Predicate(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Arc<Value>> {
        match self {
            Bindable::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_comparison(&self) -> Option<&Arc<Comparison>> {
        match self {
            Bindable::Comparison(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_plan(&self) -> Option<&Arc<QueryPlan>> {
        match self {
            Bindable::Plan(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Bindable]> {
        match self {
            Bindable::List(items) => Some(items),
            _ => None,
        }
    }

    /// Elements of a collection, `None` for anything else
    pub fn elements<'a>(&self, memo: &'a Memo) -> Option<Elements<'a>> {
        match self {
            Bindable::List(items) => Some(Elements::List(Arc::clone(items))),
            Bindable::Members { group, plans_only } => Some(Elements::Members {
                members: memo.members(*group),
                plans_only: *plans_only,
            }),
            _ => None,
        }
    }
}

/// Read-only view of a collection's elements.
///
/// Cloning the view is cheap; each element is produced only when reached.
#[derive(Debug, Clone)]
pub enum Elements<'a> {
    List(Arc<[Bindable]>),
    Members {
        members: &'a [RelationalExpression],
        plans_only: bool,
    },
}

impl<'a> Elements<'a> {
    /// First element at or after `start`, with its position
    pub fn next_from(&self, start: usize) -> Option<(usize, Bindable)> {
        match self {
            Elements::List(items) => items.get(start).map(|item| (start, item.clone())),
            Elements::Members {
                members,
                plans_only,
            } => members
                .get(start..)?
                .iter()
                .enumerate()
                .find(|(_, m)| !plans_only || matches!(m, RelationalExpression::Plan(_)))
                .map(|(offset, m)| (start + offset, Bindable::from(m.clone()))),
        }
    }

    /// Elements in order
    pub fn iter(self) -> impl Iterator<Item = Bindable> + 'a {
        let mut start = 0;
        iter::from_fn(move || {
            let (position, item) = self.next_from(start)?;
            start = position + 1;
            Some(item)
        })
    }
}

impl From<RelationalExpression> for Bindable {
    fn from(expression: RelationalExpression) -> Self {
        match expression {
            RelationalExpression::Plan(plan) => Bindable::Plan(plan),
            other => Bindable::Expression(other),
        }
    }
}

/// Immutable association from matcher identity to bound objects.
///
/// Merging concatenates per-matcher entries; a matcher bound on both sides
/// keeps both objects.
#[derive(Debug, Clone, Default)]
pub struct PlannerBindings {
    entries: Arc<BTreeMap<MatcherId, Vec<Bindable>>>,
}

impl PlannerBindings {
    /// No bindings
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single binding
    pub fn single(id: MatcherId, bound: Bindable) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(id, vec![bound]);
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Union of both binding sets
    pub fn merged_with(&self, other: &PlannerBindings) -> Self {
        if other.entries.is_empty() {
            return self.clone();
        }
        if self.entries.is_empty() {
            return other.clone();
        }
        let mut entries = (*self.entries).clone();
        for (id, bound) in other.entries.iter() {
            entries
                .entry(*id)
                .or_insert_with(Vec::new)
                .extend(bound.iter().cloned());
        }
        Self {
            entries: Arc::new(entries),
        }
    }

    /// First object bound by `id`
    pub fn get(&self, id: MatcherId) -> Option<&Bindable> {
        self.entries.get(&id).and_then(|v| v.first())
    }

    /// Every object bound by `id`, in merge order
    pub fn get_all(&self, id: MatcherId) -> &[Bindable] {
        self.entries
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, id: MatcherId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matcher_ids_unique() {
        let a = MatcherId::next();
        let b = MatcherId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_merge_keeps_both_sides() {
        let x = MatcherId::next();
        let y = MatcherId::next();
        let left = PlannerBindings::single(x, Bindable::Scalar(json!(1)));
        let right = PlannerBindings::single(x, Bindable::Scalar(json!(2)))
            .merged_with(&PlannerBindings::single(y, Bindable::Scalar(json!(3))));

        let merged = left.merged_with(&right);
        assert_eq!(
            merged.get_all(x),
            &[Bindable::Scalar(json!(1)), Bindable::Scalar(json!(2))]
        );
        assert_eq!(merged.get(y), Some(&Bindable::Scalar(json!(3))));

        // inputs are untouched
        assert_eq!(left.get_all(x).len(), 1);
        assert!(!left.contains(y));
    }

    #[test]
    fn test_member_elements_skip_logical_members() {
        let mut memo = Memo::new();
        let group = memo.new_group(RelationalExpression::LogicalScan {
            record_type: "A".to_string(),
        });
        memo.insert(
            group,
            RelationalExpression::Plan(Arc::new(QueryPlan::scan("A"))),
        );

        let all = Bindable::Members {
            group,
            plans_only: false,
        };
        let plans = Bindable::Members {
            group,
            plans_only: true,
        };
        assert_eq!(all.kind(), BindableKind::List);
        assert_eq!(all.elements(&memo).unwrap().iter().count(), 2);

        let view = plans.elements(&memo).unwrap();
        let (position, first) = view.next_from(0).unwrap();
        assert_eq!(position, 1);
        assert_eq!(first.kind(), BindableKind::Plan);
        assert!(view.next_from(2).is_none());
        assert!(Bindable::Scalar(json!(1)).elements(&memo).is_none());
    }

    #[test]
    fn test_empty_merge() {
        let x = MatcherId::next();
        let single = PlannerBindings::single(x, Bindable::Scalar(json!(1)));
        assert!(PlannerBindings::empty().is_empty());
        assert_eq!(PlannerBindings::empty().merged_with(&single).get_all(x).len(), 1);
        assert!(PlannerBindings::empty().get_all(x).is_empty());
    }
}
