//! Binding matchers, planner bindings and the memo
//!
//! Rewrite rules recognize shapes by running matchers against predicates,
//! plans and memo groups. Matching is pure: it never mutates the candidate,
//! the memo, or prior bindings, and a miss is an empty sequence rather than
//! an error.

mod bindings;
mod combinators;
mod memo;
mod reference;

pub use bindings::{Bindable, BindableKind, Elements, MatcherId, PlannerBindings};
pub use combinators::{
    all, all_of, any, equals, typed, typed_where, typed_with_downstream, AllMatcher,
    AllOfMatcher, AnyMatcher, BindingMatcher, Bindings, Condition, EqualsMatcher, Extractor,
    TypedMatcher, TypedWithDownstreamMatcher,
};
pub use memo::{ExpressionRef, GroupId, Memo, RelationalExpression};
pub use reference::{any_ref, any_ref_over_only_plans, grouping, grouping_plans};
