//! Binding matchers and their combinators
//!
//! A matcher describes a shape. Given prior bindings and a candidate it yields
//! a lazy sequence of `PlannerBindings`, one per way the shape matches. A
//! candidate of the wrong kind yields an empty sequence.

use std::iter;

use super::bindings::{Bindable, BindableKind, Elements, MatcherId, PlannerBindings};
use super::memo::Memo;

/// Lazy sequence of bindings
pub type Bindings<'a> = Box<dyn Iterator<Item = PlannerBindings> + 'a>;

/// Pulls a sub-object out of a typed candidate
pub type Extractor = fn(&Memo, &Bindable) -> Option<Bindable>;

/// Extra condition on a typed candidate
pub type Condition = fn(&Bindable) -> bool;

/// A composable, side-effect-free pattern over `Bindable`s.
pub trait BindingMatcher {
    /// Key under which this matcher records what it bound
    fn id(&self) -> MatcherId;

    /// Kind of candidate this matcher can bind against
    fn root_kind(&self) -> BindableKind;

    /// Every way this matcher matches `candidate`, lazily.
    ///
    /// Calling again restarts the sequence.
    fn bind_matches<'a>(
        &'a self,
        memo: &'a Memo,
        outer: &PlannerBindings,
        candidate: &Bindable,
    ) -> Bindings<'a>;

    fn boxed(self) -> Box<dyn BindingMatcher>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

fn no_bindings<'a>() -> Bindings<'a> {
    Box::new(iter::empty())
}

/// Binds any candidate of a kind, optionally subject to a condition.
pub struct TypedMatcher {
    id: MatcherId,
    kind: BindableKind,
    condition: Option<Condition>,
}

impl BindingMatcher for TypedMatcher {
    fn id(&self) -> MatcherId {
        self.id
    }

    fn root_kind(&self) -> BindableKind {
        self.kind
    }

    fn bind_matches<'a>(
        &'a self,
        _memo: &'a Memo,
        _outer: &PlannerBindings,
        candidate: &Bindable,
    ) -> Bindings<'a> {
        if candidate.kind() != self.kind {
            return no_bindings();
        }
        if let Some(condition) = self.condition {
            if !condition(candidate) {
                return no_bindings();
            }
        }
        Box::new(iter::once(PlannerBindings::single(
            self.id,
            candidate.clone(),
        )))
    }
}

/// Extracts a sub-object from a typed candidate and matches it downstream.
///
/// Each downstream binding is merged with this matcher's binding of the
/// original candidate.
pub struct TypedWithDownstreamMatcher {
    id: MatcherId,
    kind: BindableKind,
    extract: Extractor,
    downstream: Box<dyn BindingMatcher>,
}

impl BindingMatcher for TypedWithDownstreamMatcher {
    fn id(&self) -> MatcherId {
        self.id
    }

    fn root_kind(&self) -> BindableKind {
        self.kind
    }

    fn bind_matches<'a>(
        &'a self,
        memo: &'a Memo,
        outer: &PlannerBindings,
        candidate: &Bindable,
    ) -> Bindings<'a> {
        if candidate.kind() != self.kind {
            return no_bindings();
        }
        let extracted = match (self.extract)(memo, candidate) {
            Some(e) => e,
            None => return no_bindings(),
        };
        let own = PlannerBindings::single(self.id, candidate.clone());
        Box::new(
            self.downstream
                .bind_matches(memo, outer, &extracted)
                .map(move |b| own.merged_with(&b)),
        )
    }
}

/// Conjunction: the cross product of every sub-matcher's bindings against
/// the same candidate.
///
/// Each sub-matcher sees the outer bindings merged with what earlier
/// sub-matchers bound on the same branch.
pub struct AllOfMatcher {
    id: MatcherId,
    kind: BindableKind,
    matchers: Vec<Box<dyn BindingMatcher>>,
}

impl BindingMatcher for AllOfMatcher {
    fn id(&self) -> MatcherId {
        self.id
    }

    fn root_kind(&self) -> BindableKind {
        self.kind
    }

    fn bind_matches<'a>(
        &'a self,
        memo: &'a Memo,
        outer: &PlannerBindings,
        candidate: &Bindable,
    ) -> Bindings<'a> {
        if candidate.kind() != self.kind {
            return no_bindings();
        }
        let mut acc: Bindings<'a> = Box::new(iter::once(PlannerBindings::empty()));
        for matcher in &self.matchers {
            let outer = outer.clone();
            let candidate = candidate.clone();
            acc = Box::new(acc.flat_map(move |partial| {
                let visible = outer.merged_with(&partial);
                matcher
                    .bind_matches(memo, &visible, &candidate)
                    .map(move |b| partial.merged_with(&b))
            }));
        }
        let own = PlannerBindings::single(self.id, candidate.clone());
        Box::new(acc.map(move |b| b.merged_with(&own)))
    }
}

/// Matches each element of a list independently: one binding set per
/// element the downstream matcher accepts.
pub struct AnyMatcher {
    id: MatcherId,
    downstream: Box<dyn BindingMatcher>,
}

impl BindingMatcher for AnyMatcher {
    fn id(&self) -> MatcherId {
        self.id
    }

    fn root_kind(&self) -> BindableKind {
        BindableKind::List
    }

    fn bind_matches<'a>(
        &'a self,
        memo: &'a Memo,
        outer: &PlannerBindings,
        candidate: &Bindable,
    ) -> Bindings<'a> {
        let elements = match candidate.elements(memo) {
            Some(elements) => elements,
            None => return no_bindings(),
        };
        let outer = outer.clone();
        let id = self.id;
        let downstream = &self.downstream;
        Box::new(elements.iter().flat_map(move |item| {
            let own = PlannerBindings::single(id, item.clone());
            downstream
                .bind_matches(memo, &outer, &item)
                .map(move |b| b.merged_with(&own))
        }))
    }
}

/// Requires every element of a list to match; yields the cross product of
/// the per-element bindings. Every element is bound under this matcher's id.
pub struct AllMatcher {
    id: MatcherId,
    downstream: Box<dyn BindingMatcher>,
}

impl BindingMatcher for AllMatcher {
    fn id(&self) -> MatcherId {
        self.id
    }

    fn root_kind(&self) -> BindableKind {
        BindableKind::List
    }

    fn bind_matches<'a>(
        &'a self,
        memo: &'a Memo,
        outer: &PlannerBindings,
        candidate: &Bindable,
    ) -> Bindings<'a> {
        match candidate.elements(memo) {
            Some(elements) => {
                self.bind_from(memo, outer.clone(), elements, 0, PlannerBindings::empty())
            }
            None => no_bindings(),
        }
    }
}

impl AllMatcher {
    /// Bindings for the elements at or after `start`, extending `partial`
    fn bind_from<'a>(
        &'a self,
        memo: &'a Memo,
        outer: PlannerBindings,
        elements: Elements<'a>,
        start: usize,
        partial: PlannerBindings,
    ) -> Bindings<'a> {
        let (position, item) = match elements.next_from(start) {
            Some(next) => next,
            None => return Box::new(iter::once(partial)),
        };
        let visible = outer.merged_with(&partial);
        let own = partial.merged_with(&PlannerBindings::single(self.id, item.clone()));
        Box::new(
            self.downstream
                .bind_matches(memo, &visible, &item)
                .flat_map(move |b| {
                    self.bind_from(
                        memo,
                        outer.clone(),
                        elements.clone(),
                        position + 1,
                        own.merged_with(&b),
                    )
                }),
        )
    }
}

/// Binds a candidate equal to an expected object.
pub struct EqualsMatcher {
    id: MatcherId,
    expected: Bindable,
}

impl BindingMatcher for EqualsMatcher {
    fn id(&self) -> MatcherId {
        self.id
    }

    fn root_kind(&self) -> BindableKind {
        self.expected.kind()
    }

    fn bind_matches<'a>(
        &'a self,
        _memo: &'a Memo,
        _outer: &PlannerBindings,
        candidate: &Bindable,
    ) -> Bindings<'a> {
        if *candidate != self.expected {
            return no_bindings();
        }
        Box::new(iter::once(PlannerBindings::single(
            self.id,
            candidate.clone(),
        )))
    }
}

/// Any candidate of `kind`
pub fn typed(kind: BindableKind) -> TypedMatcher {
    TypedMatcher {
        id: MatcherId::next(),
        kind,
        condition: None,
    }
}

/// Any candidate of `kind` satisfying `condition`
pub fn typed_where(kind: BindableKind, condition: Condition) -> TypedMatcher {
    TypedMatcher {
        id: MatcherId::next(),
        kind,
        condition: Some(condition),
    }
}

pub fn typed_with_downstream(
    kind: BindableKind,
    extract: Extractor,
    downstream: impl BindingMatcher + 'static,
) -> TypedWithDownstreamMatcher {
    TypedWithDownstreamMatcher {
        id: MatcherId::next(),
        kind,
        extract,
        downstream: Box::new(downstream),
    }
}

pub fn all_of(kind: BindableKind, matchers: Vec<Box<dyn BindingMatcher>>) -> AllOfMatcher {
    AllOfMatcher {
        id: MatcherId::next(),
        kind,
        matchers,
    }
}

pub fn any(downstream: impl BindingMatcher + 'static) -> AnyMatcher {
    AnyMatcher {
        id: MatcherId::next(),
        downstream: Box::new(downstream),
    }
}

pub fn all(downstream: impl BindingMatcher + 'static) -> AllMatcher {
    AllMatcher {
        id: MatcherId::next(),
        downstream: Box::new(downstream),
    }
}

pub fn equals(expected: Bindable) -> EqualsMatcher {
    EqualsMatcher {
        id: MatcherId::next(),
        expected,
    }
}
