//! Matchers the planner uses to recognize predicate shapes and pick plans
//!
//! Each conjunct of a filter is offered to the matchers as a
//! `Bindable::Predicate`; the first matcher that binds decides how the
//! conjunct can be planned.

use std::sync::Arc;

use crate::expr::{Comparison, ComparisonType, Operand, QueryPredicate};
use crate::matcher::{
    any, grouping_plans, typed, typed_where, typed_with_downstream, Bindable, BindableKind,
    BindingMatcher, GroupId, Memo, MatcherId, PlannerBindings, TypedMatcher,
    TypedWithDownstreamMatcher,
};
use crate::plan::QueryPlan;

/// How a conjunct can be used by an index scan
#[derive(Debug, Clone)]
pub(crate) enum ConjunctKind {
    /// `field op value` usable as an index bound
    Sargable {
        field: String,
        comparison: Arc<Comparison>,
    },
    /// `field IN list`
    In {
        field: String,
        comparison: Arc<Comparison>,
    },
    /// `one of field IN list` over a repeated field
    OneOfThemIn {
        field: String,
        comparison: Arc<Comparison>,
    },
    /// A disjunction
    Or(Vec<Arc<QueryPredicate>>),
    /// Only usable as a filter
    Residual,
}

/// A filter conjunct and its classification
#[derive(Debug, Clone)]
pub(crate) struct Conjunct {
    pub predicate: Arc<QueryPredicate>,
    pub kind: ConjunctKind,
}

impl Conjunct {
    /// Field of an IN conjunct
    pub fn in_field(&self) -> Option<&str> {
        match &self.kind {
            ConjunctKind::In { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Field an index column could serve
    pub fn index_field(&self) -> Option<&str> {
        match &self.kind {
            ConjunctKind::Sargable { field, .. }
            | ConjunctKind::In { field, .. }
            | ConjunctKind::OneOfThemIn { field, .. } => Some(field),
            ConjunctKind::Or(_) | ConjunctKind::Residual => None,
        }
    }

    /// Values of an IN conjunct over a literal list
    pub fn literal_in_values(&self) -> Option<&[serde_json::Value]> {
        match &self.kind {
            ConjunctKind::In { comparison, .. } => match &comparison.operand {
                Operand::LiteralList(values) => Some(values.as_slice()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Comparison of a predicate over a field of the current record
fn field_comparison(_memo: &Memo, candidate: &Bindable) -> Option<Bindable> {
    match candidate.as_predicate()?.as_ref() {
        QueryPredicate::Value(p) if p.value.field_path().is_some() => {
            Some(Bindable::Comparison(p.comparison.clone()))
        }
        _ => None,
    }
}

/// Comparison of a `OneOfThem` predicate
fn element_comparison(_memo: &Memo, candidate: &Bindable) -> Option<Bindable> {
    match candidate.as_predicate()?.as_ref() {
        QueryPredicate::OneOfThem(p) => Some(Bindable::Comparison(p.comparison.clone())),
        _ => None,
    }
}

fn is_in_list(candidate: &Bindable) -> bool {
    candidate.as_comparison().map_or(false, |c| {
        c.op == ComparisonType::In
            && matches!(c.operand, Operand::LiteralList(_) | Operand::Parameter(_))
    })
}

fn is_sargable(candidate: &Bindable) -> bool {
    candidate.as_comparison().map_or(false, |c| {
        (c.op == ComparisonType::Equals || c.op.is_range())
            && match &c.operand {
                Operand::Literal(v) => !v.is_null(),
                Operand::Parameter(_) => true,
                _ => false,
            }
    })
}

fn is_or(candidate: &Bindable) -> bool {
    matches!(
        candidate.as_predicate().map(|p| p.as_ref()),
        Some(QueryPredicate::Or(_))
    )
}

/// Matcher whose downstream comparison binding is read back by id
struct ComparisonRule {
    matcher: TypedWithDownstreamMatcher,
    comparison: MatcherId,
}

impl ComparisonRule {
    fn new(
        extract: fn(&Memo, &Bindable) -> Option<Bindable>,
        condition: fn(&Bindable) -> bool,
    ) -> Self {
        let inner = typed_where(BindableKind::Comparison, condition);
        let comparison = inner.id();
        Self {
            matcher: typed_with_downstream(BindableKind::Predicate, extract, inner),
            comparison,
        }
    }

    fn bind(&self, memo: &Memo, candidate: &Bindable) -> Option<Arc<Comparison>> {
        self.matcher
            .bind_matches(memo, &PlannerBindings::empty(), candidate)
            .next()
            .and_then(|b| b.get(self.comparison).and_then(|c| c.as_comparison().cloned()))
    }
}

/// The planner's rule set
pub(crate) struct PlannerRules {
    in_list: ComparisonRule,
    one_of_them_in: ComparisonRule,
    sargable: ComparisonRule,
    disjunction: TypedMatcher,
    best_plan: TypedWithDownstreamMatcher,
    best_plan_member: MatcherId,
}

impl PlannerRules {
    pub fn new() -> Self {
        let member = typed(BindableKind::Plan);
        let best_plan_member = member.id();
        Self {
            in_list: ComparisonRule::new(field_comparison, is_in_list),
            one_of_them_in: ComparisonRule::new(element_comparison, is_in_list),
            sargable: ComparisonRule::new(field_comparison, is_sargable),
            disjunction: typed_where(BindableKind::Predicate, is_or),
            best_plan: grouping_plans(any(member)),
            best_plan_member,
        }
    }

    /// Classifies one conjunct
    pub fn classify(&self, predicate: &Arc<QueryPredicate>) -> Conjunct {
        let memo = Memo::new();
        let candidate = Bindable::Predicate(predicate.clone());
        let kind = match predicate.as_ref() {
            QueryPredicate::Value(p) => {
                let field = p.value.field_path().map(str::to_string);
                match (field, self.in_list.bind(&memo, &candidate)) {
                    (Some(field), Some(comparison)) => ConjunctKind::In { field, comparison },
                    (field, _) => match (field, self.sargable.bind(&memo, &candidate)) {
                        (Some(field), Some(comparison)) => {
                            ConjunctKind::Sargable { field, comparison }
                        }
                        _ => ConjunctKind::Residual,
                    },
                }
            }
            QueryPredicate::OneOfThem(p) => match self.one_of_them_in.bind(&memo, &candidate) {
                Some(comparison) => ConjunctKind::OneOfThemIn {
                    field: p.field.clone(),
                    comparison,
                },
                None => ConjunctKind::Residual,
            },
            QueryPredicate::Or(branches) => {
                let matched = self
                    .disjunction
                    .bind_matches(&memo, &PlannerBindings::empty(), &candidate)
                    .next()
                    .is_some();
                if matched {
                    ConjunctKind::Or(branches.clone())
                } else {
                    ConjunctKind::Residual
                }
            }
            QueryPredicate::And(_) | QueryPredicate::Not(_) => ConjunctKind::Residual,
        };
        Conjunct {
            predicate: predicate.clone(),
            kind,
        }
    }

    /// First physical plan in a memo group
    pub fn best_plan(&self, memo: &Memo, group: GroupId) -> Option<Arc<QueryPlan>> {
        self.best_plan
            .bind_matches(memo, &PlannerBindings::empty(), &Bindable::Ref(group))
            .next()
            .and_then(|b| b.get(self.best_plan_member).and_then(|p| p.as_plan().cloned()))
    }
}
