//! Matchers over memo groups
//!
//! A group never has a canonical member. These matchers hand a view of the
//! member set, optionally restricted to physical plans, to a collection
//! matcher such as `any` or `all`. Members are read from the memo as the
//! collection matcher reaches them.

use super::bindings::{Bindable, BindableKind};
use super::combinators::{
    all, typed, typed_with_downstream, BindingMatcher, TypedMatcher, TypedWithDownstreamMatcher,
};
use super::memo::Memo;

fn group_members(_memo: &Memo, candidate: &Bindable) -> Option<Bindable> {
    match candidate {
        Bindable::Ref(group) => Some(Bindable::Members {
            group: *group,
            plans_only: false,
        }),
        _ => None,
    }
}

fn group_plan_members(_memo: &Memo, candidate: &Bindable) -> Option<Bindable> {
    match candidate {
        Bindable::Ref(group) => Some(Bindable::Members {
            group: *group,
            plans_only: true,
        }),
        _ => None,
    }
}

/// Any memo group
pub fn any_ref() -> TypedMatcher {
    typed(BindableKind::Ref)
}

/// Matches the member list of a group with `downstream`
pub fn grouping(downstream: impl BindingMatcher + 'static) -> TypedWithDownstreamMatcher {
    typed_with_downstream(BindableKind::Ref, group_members, downstream)
}

/// Matches the physical-plan members of a group with `downstream`
pub fn grouping_plans(downstream: impl BindingMatcher + 'static) -> TypedWithDownstreamMatcher {
    typed_with_downstream(BindableKind::Ref, group_plan_members, downstream)
}

/// A group whose members are all physical plans
pub fn any_ref_over_only_plans() -> TypedWithDownstreamMatcher {
    grouping(all(typed(BindableKind::Plan)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{any, Bindings, MatcherId, Memo, PlannerBindings, RelationalExpression};
    use crate::plan::QueryPlan;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn plan(record_type: &str) -> RelationalExpression {
        RelationalExpression::Plan(Arc::new(QueryPlan::scan(record_type)))
    }

    #[test]
    fn test_only_plans() {
        let mut memo = Memo::new();
        let plans = memo.new_group(plan("A"));
        memo.insert(plans, plan("B"));
        let mixed = memo.new_group(RelationalExpression::LogicalScan {
            record_type: "A".to_string(),
        });
        memo.insert(mixed, plan("A"));

        let matcher = any_ref_over_only_plans();
        let outer = PlannerBindings::empty();
        let count = |group| matcher.bind_matches(&memo, &outer, &Bindable::Ref(group)).count();
        assert_eq!(count(plans), 1);
        assert_eq!(count(mixed), 0);
    }

    #[test]
    fn test_grouping_plans_enumerates_alternatives() {
        let mut memo = Memo::new();
        let group = memo.new_group(RelationalExpression::LogicalScan {
            record_type: "A".to_string(),
        });
        memo.insert(group, plan("A"));
        memo.insert(group, plan("B"));

        let member = typed(BindableKind::Plan);
        let member_id = member.id();
        let matcher = grouping_plans(any(member));
        let found: Vec<_> = matcher
            .bind_matches(&memo, &PlannerBindings::empty(), &Bindable::Ref(group))
            .map(|b| b.get(member_id).cloned())
            .collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], Some(Bindable::from(plan("A"))));
    }

    #[test]
    fn test_reference_matchers_reject_non_groups() {
        let memo = Memo::new();
        let outer = PlannerBindings::empty();
        let scalar = Bindable::Scalar(serde_json::json!(1));
        assert_eq!(any_ref().bind_matches(&memo, &outer, &scalar).count(), 0);
        let members = grouping(any(typed(BindableKind::Plan)));
        assert_eq!(members.bind_matches(&memo, &outer, &scalar).count(), 0);
    }

    /// Counts how many candidates it has been asked to match
    struct Counting {
        id: MatcherId,
        calls: Rc<Cell<usize>>,
    }

    impl BindingMatcher for Counting {
        fn id(&self) -> MatcherId {
            self.id
        }

        fn root_kind(&self) -> BindableKind {
            BindableKind::Plan
        }

        fn bind_matches<'a>(
            &'a self,
            _memo: &'a Memo,
            _outer: &PlannerBindings,
            candidate: &Bindable,
        ) -> Bindings<'a> {
            self.calls.set(self.calls.get() + 1);
            Box::new(std::iter::once(PlannerBindings::single(
                self.id,
                candidate.clone(),
            )))
        }
    }

    #[test]
    fn test_members_matched_on_demand() {
        let mut memo = Memo::new();
        let group = memo.new_group(plan("A"));
        memo.insert(group, plan("B"));
        memo.insert(group, plan("C"));

        let calls = Rc::new(Cell::new(0));
        let matcher = grouping_plans(any(Counting {
            id: MatcherId::next(),
            calls: Rc::clone(&calls),
        }));
        let outer = PlannerBindings::empty();

        let mut bindings = matcher.bind_matches(&memo, &outer, &Bindable::Ref(group));
        assert_eq!(calls.get(), 0);
        assert!(bindings.next().is_some());
        assert_eq!(calls.get(), 1);
        drop(bindings);

        assert_eq!(matcher.bind_matches(&memo, &outer, &Bindable::Ref(group)).count(), 3);
        assert_eq!(calls.get(), 4);
    }
}
