//! Memo: an arena of equivalence groups
//!
//! Groups are addressed by `GroupId` handles. Parents reference children by
//! handle, so shared sub-results form a DAG without ownership cycles.
//! Membership only grows during a planning session.

use std::sync::Arc;

use crate::expr::QueryPredicate;
use crate::plan::QueryPlan;

/// Handle of a memo group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(usize);

/// A member of a memo group
#[derive(Debug, Clone, PartialEq)]
pub enum RelationalExpression {
    /// Every record of a type
    LogicalScan { record_type: String },
    /// Records of the inner group satisfying every predicate
    LogicalFilter {
        predicates: Vec<Arc<QueryPredicate>>,
        inner: GroupId,
    },
    /// A physical realization
    Plan(Arc<QueryPlan>),
}

/// Equivalence class of interchangeable expressions
#[derive(Debug, Clone, Default)]
pub struct ExpressionRef {
    members: Vec<RelationalExpression>,
}

impl ExpressionRef {
    /// Members in insertion order
    pub fn members(&self) -> &[RelationalExpression] {
        &self.members
    }
}

/// Arena of memo groups owned by one planning session
#[derive(Debug, Default)]
pub struct Memo {
    groups: Vec<ExpressionRef>,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a group whose first member is `expression`
    pub fn new_group(&mut self, expression: RelationalExpression) -> GroupId {
        self.groups.push(ExpressionRef {
            members: vec![expression],
        });
        GroupId(self.groups.len() - 1)
    }

    /// Adds an equivalent member; returns false if it is already present.
    pub fn insert(&mut self, group: GroupId, expression: RelationalExpression) -> bool {
        match self.groups.get_mut(group.0) {
            Some(g) if !g.members.contains(&expression) => {
                g.members.push(expression);
                true
            }
            _ => false,
        }
    }

    pub fn group(&self, id: GroupId) -> Option<&ExpressionRef> {
        self.groups.get(id.0)
    }

    /// Members of a group; empty for an unknown handle
    pub fn members(&self, id: GroupId) -> &[RelationalExpression] {
        self.group(id).map(|g| g.members()).unwrap_or(&[])
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
