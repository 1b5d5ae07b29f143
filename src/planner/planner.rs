//! IN-aware query planner
//!
//! Candidate strategies for a conjunctive filter:
//! 1. Record scan with every conjunct as a filter
//! 2. Per index over a filtered or sorted field: equality prefix, IN
//!    predicates as IN-joins, range bounds on the next column, the rest as a
//!    filter
//! 3. Per index: as above with IN predicates left in the filter
//! 4. IN lists rewritten into an ordered union of equality branches
//! 5. Disjunctions planned branch by branch and merged by a union
//!
//! Candidates that cannot produce the requested sort are dropped. The rest
//! rank by index columns constrained, then IN-join before union before plain
//! scans, then index name. Ties are therefore broken deterministically.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value as Json;

use crate::expr::{
    Comparison, ComparisonType, CorrelationIdentifier, Field, Operand, QueryPredicate,
};
use crate::index::{compare_json, IndexDefinition, RecordType};
use crate::matcher::{Memo, RelationalExpression};
use crate::observability::{log_debug, log_trace};
use crate::plan::{InSource, PlanOrdering, QueryPlan, ScanComparisons};

use super::catalog::IndexCatalog;
use super::config::PlannerConfig;
use super::errors::{PlannerError, PlannerResult};
use super::query::Query;
use super::rules::{Conjunct, ConjunctKind, PlannerRules};
use super::validate::QueryValidator;

/// Strategy of a candidate, in preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Strategy {
    InJoin,
    Union,
    IndexScan,
    Scan,
}

/// A candidate physical plan with what the planner knows about it
#[derive(Debug, Clone)]
struct Candidate {
    plan: Arc<QueryPlan>,
    ordering: PlanOrdering,
    /// Index columns constrained; the smallest over union branches
    matched: usize,
    strategy: Strategy,
    index: String,
}

impl Candidate {
    fn rank(&self, other: &Candidate) -> Ordering {
        (Reverse(self.matched), self.strategy, &self.index).cmp(&(
            Reverse(other.matched),
            other.strategy,
            &other.index,
        ))
    }
}

/// An IN predicate consumed by an index scan through an IN-join
#[derive(Debug, Clone)]
struct PendingJoin {
    field: String,
    binding: CorrelationIdentifier,
    source: InSource,
    position: usize,
}

/// Query planner
pub struct QueryPlanner<'a, C: IndexCatalog> {
    catalog: &'a C,
    config: PlannerConfig,
    rules: PlannerRules,
}

impl<'a, C: IndexCatalog> QueryPlanner<'a, C> {
    /// Creates a planner over an index catalog
    pub fn new(catalog: &'a C, config: PlannerConfig) -> Self {
        Self {
            catalog,
            config,
            rules: PlannerRules::new(),
        }
    }

    /// Returns the planner configuration
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plans a query.
    ///
    /// Deterministic: the same query against the same catalog and
    /// configuration always yields the same plan.
    pub fn plan(&self, query: &Query) -> PlannerResult<Arc<QueryPlan>> {
        // Step 1: Resolve the record type
        let record_type = self
            .catalog
            .record_type(&query.record_type)
            .ok_or_else(|| PlannerError::unknown_record_type(&query.record_type))?;

        // Step 2: Reject structurally invalid queries
        QueryValidator::new(record_type).validate(query)?;

        // Step 3: Build and rank candidates
        let predicates = query.conjuncts();
        let candidates = self.plan_conjuncts(record_type, &predicates, &query.sort, true);

        // Step 4: Record the alternatives for the query root
        let mut memo = Memo::new();
        let scan = memo.new_group(RelationalExpression::LogicalScan {
            record_type: record_type.name.clone(),
        });
        let root = memo.new_group(RelationalExpression::LogicalFilter {
            predicates,
            inner: scan,
        });
        for candidate in &candidates {
            memo.insert(root, RelationalExpression::Plan(candidate.plan.clone()));
        }

        // Step 5: Select
        let plan = self
            .rules
            .best_plan(&memo, root)
            .ok_or_else(|| PlannerError::sort_not_satisfiable(&query.sort))?;

        if plan.has_in_join() {
            log_debug!(
                component = "planner",
                event = "in_join_planned",
                record_type = %record_type.name,
                plan = %plan,
            );
        }
        Ok(plan)
    }

    /// Ranked candidates for a conjunction that produce `sort`
    fn plan_conjuncts(
        &self,
        record_type: &RecordType,
        predicates: &[Arc<QueryPredicate>],
        sort: &[String],
        allow_in_as_or: bool,
    ) -> Vec<Candidate> {
        let conjuncts: Vec<Conjunct> = predicates.iter().map(|p| self.rules.classify(p)).collect();

        let scan = scan_candidate(record_type, predicates);
        let scan_satisfies = scan.ordering.satisfies(sort);
        let mut candidates = vec![scan];
        for index in self.usable_indexes(record_type, &conjuncts, sort) {
            let joined = match self.index_candidate(record_type, index, &conjuncts, sort, true) {
                Some(c) => c,
                None => continue,
            };
            if joined.strategy == Strategy::InJoin {
                let plain = self.index_candidate(record_type, index, &conjuncts, sort, false);
                candidates.extend(plain);
            }
            candidates.push(joined);
        }
        for candidate in &candidates {
            log_trace!(
                component = "planner",
                event = "candidate",
                plan = %candidate.plan,
                matched = candidate.matched,
                sorted = candidate.ordering.satisfies(sort),
            );
        }

        let join_dropped = candidates
            .iter()
            .any(|c| c.strategy == Strategy::InJoin && !c.ordering.satisfies(sort));
        candidates.retain(|c| {
            c.ordering.satisfies(sort)
                && (c.matched > 0 || c.strategy == Strategy::Scan || !scan_satisfies)
        });

        if allow_in_as_or
            && self.config.attempt_failed_in_join_as_or
            && join_dropped
            && !sort.is_empty()
            && !candidates.iter().any(|c| c.strategy == Strategy::InJoin)
        {
            if let Some(union) = self.in_as_or_candidate(record_type, &conjuncts, sort) {
                candidates.push(union);
            }
        }
        if let Some(union) =
            self.disjunction_candidate(record_type, &conjuncts, sort, &candidates, allow_in_as_or)
        {
            candidates.push(union);
        }

        candidates.sort_by(|a, b| a.rank(b));

        let has_in = conjuncts.iter().any(|c| c.in_field().is_some());
        if let Some(best) = candidates.first() {
            if join_dropped && has_in && best.strategy != Strategy::Union {
                log_debug!(
                    component = "planner",
                    event = "fallback_filter_planned",
                    plan = %best.plan,
                );
            }
        }
        candidates
    }

    /// Indexes with a column over a filtered or sorted field, ordered by name
    fn usable_indexes(
        &self,
        record_type: &RecordType,
        conjuncts: &[Conjunct],
        sort: &[String],
    ) -> Vec<&'a IndexDefinition> {
        let catalog: &'a C = self.catalog;
        let fields: BTreeSet<&str> = conjuncts
            .iter()
            .filter_map(Conjunct::index_field)
            .chain(sort.iter().map(String::as_str))
            .collect();
        let mut indexes: BTreeMap<&str, &'a IndexDefinition> = BTreeMap::new();
        for field in fields {
            for index in catalog.candidate_indexes(&record_type.name, field) {
                indexes.insert(index.name.as_str(), index);
            }
        }
        indexes.into_values().collect()
    }

    /// Index scan candidate; IN predicates become IN-joins when `join_in`.
    ///
    /// A fan-out column holds one entry per array element, so scanning it
    /// without binding the element repeats some records and misses records
    /// with empty arrays. An index is only usable when every fan-out column
    /// is bound by a one-of-them IN-join.
    fn index_candidate(
        &self,
        record_type: &RecordType,
        index: &IndexDefinition,
        conjuncts: &[Conjunct],
        sort: &[String],
        join_in: bool,
    ) -> Option<Candidate> {
        let mut used = vec![false; conjuncts.len()];
        let mut comparisons = ScanComparisons::default();
        let mut keys: Vec<String> = index.columns.iter().map(|c| c.field.clone()).collect();
        if !keys.contains(&record_type.primary_key) {
            keys.push(record_type.primary_key.clone());
        }
        let mut ordering = PlanOrdering::new(keys);
        let mut joins: Vec<PendingJoin> = Vec::new();
        let mut fan_out_bound = 0;

        for column in &index.columns {
            if column.fan_out {
                let found = if join_in {
                    find_unused(conjuncts, &used, |kind| match kind {
                        ConjunctKind::OneOfThemIn { field, comparison }
                            if *field == column.field =>
                        {
                            Some(comparison.clone())
                        }
                        _ => None,
                    })
                } else {
                    None
                };
                match found.and_then(|(i, cmp)| pending_join(conjuncts, i, &column.field, &cmp)) {
                    Some(join) => {
                        used[join.position] = true;
                        fan_out_bound += 1;
                        let cmp = Comparison::equals_correlation(join.binding.clone());
                        comparisons.equality.push(cmp.clone());
                        ordering = ordering.with_bound(column.field.clone(), cmp);
                        joins.push(join);
                        continue;
                    }
                    None => break,
                }
            }

            let equality = find_unused(conjuncts, &used, |kind| match kind {
                ConjunctKind::Sargable { field, comparison }
                    if *field == column.field && comparison.op == ComparisonType::Equals =>
                {
                    Some(comparison.clone())
                }
                _ => None,
            });
            if let Some((i, cmp)) = equality {
                used[i] = true;
                comparisons.equality.push(cmp.clone());
                ordering = ordering.with_bound(column.field.clone(), cmp);
                continue;
            }

            if join_in {
                let in_list = find_unused(conjuncts, &used, |kind| match kind {
                    ConjunctKind::In { field, comparison } if *field == column.field => {
                        Some(comparison.clone())
                    }
                    _ => None,
                });
                if let Some(join) =
                    in_list.and_then(|(i, cmp)| pending_join(conjuncts, i, &column.field, &cmp))
                {
                    used[join.position] = true;
                    let cmp = Comparison::equals_correlation(join.binding.clone());
                    comparisons.equality.push(cmp.clone());
                    ordering = ordering.with_bound(column.field.clone(), cmp);
                    joins.push(join);
                    continue;
                }
            }

            // Range bounds end the usable prefix
            while let Some((i, cmp)) = find_unused(conjuncts, &used, |kind| match kind {
                ConjunctKind::Sargable { field, comparison }
                    if *field == column.field && comparison.op.is_range() =>
                {
                    Some(comparison.clone())
                }
                _ => None,
            }) {
                used[i] = true;
                comparisons.inequality.push(cmp);
            }
            break;
        }

        let fan_out_columns = index.columns.iter().filter(|c| c.fan_out).count();
        if fan_out_bound < fan_out_columns {
            log_trace!(
                component = "planner",
                event = "index_rejected",
                index = %index.name,
                reason = "fan-out column not bound by a one-of-them join",
            );
            return None;
        }

        let residual: Vec<Arc<QueryPredicate>> = conjuncts
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|(c, _)| c.predicate.clone())
            .collect();
        let matched = comparisons.matched_columns();

        let mut plan = QueryPlan::index_scan(index.name.clone(), comparisons);
        if !residual.is_empty() {
            plan = QueryPlan::filter(Arc::new(plan), residual);
        }

        // Joins over sorted fields nest outermost, in sort order
        joins.sort_by_key(|j| {
            (
                sort.iter().position(|s| *s == j.field).unwrap_or(usize::MAX),
                j.position,
            )
        });
        for join in joins.iter().rev() {
            plan = QueryPlan::in_join(Arc::new(plan), join.binding.clone(), join.source.clone());
            ordering = ordering.joined_over(&join.field);
        }
        if index.has_fan_out() {
            plan = QueryPlan::distinct(Arc::new(plan));
        }

        Some(Candidate {
            plan: Arc::new(plan),
            ordering,
            matched,
            strategy: if joins.is_empty() {
                Strategy::IndexScan
            } else {
                Strategy::InJoin
            },
            index: index.name.clone(),
        })
    }

    /// Ordered union of equality branches, one per combination of IN values
    fn in_as_or_candidate(
        &self,
        record_type: &RecordType,
        conjuncts: &[Conjunct],
        sort: &[String],
    ) -> Option<Candidate> {
        let lists: Vec<(usize, String, Vec<Json>)> = conjuncts
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                Some((i, c.in_field()?.to_string(), sorted_values(c.literal_in_values()?)))
            })
            .collect();
        let lengths: Vec<usize> = lists.iter().map(|(_, _, values)| values.len()).collect();
        if lengths.contains(&0) || !self.config.allows_in_as_or(&lengths) {
            log_debug!(
                component = "planner",
                event = "in_as_or_abandoned",
                lists = ?lengths,
                max_branches = self.config.max_in_as_or_branches,
            );
            return None;
        }

        let mut children = Vec::new();
        let mut orderings = Vec::new();
        let mut matched = usize::MAX;
        for combination in combinations(&lengths) {
            let predicates: Vec<Arc<QueryPredicate>> = conjuncts
                .iter()
                .enumerate()
                .map(|(i, c)| match lists.iter().position(|(p, _, _)| *p == i) {
                    Some(k) => {
                        let (_, field, values) = &lists[k];
                        Field::new(field.as_str()).equals(values[combination[k]].clone())
                    }
                    None => c.predicate.clone(),
                })
                .collect();
            let best = self
                .plan_conjuncts(record_type, &predicates, sort, false)
                .into_iter()
                .next()
                .filter(|b| b.matched > 0);
            let best = match best {
                Some(b) => b,
                None => {
                    log_debug!(
                        component = "planner",
                        event = "in_as_or_abandoned",
                        reason = "branch needs an unbounded scan",
                    );
                    return None;
                }
            };
            matched = matched.min(best.matched);
            orderings.push(best.ordering);
            children.push(best.plan);
        }

        let ordering = match union_ordering(record_type, &orderings, sort) {
            Some(o) => o,
            None => {
                log_debug!(
                    component = "planner",
                    event = "in_as_or_abandoned",
                    reason = "branches have no common ordering",
                );
                return None;
            }
        };
        log_debug!(
            component = "planner",
            event = "in_as_or_planned",
            branches = children.len(),
            key = ?ordering.keys,
        );
        Some(Candidate {
            plan: Arc::new(QueryPlan::union(children, ordering.keys.clone())),
            ordering,
            matched,
            strategy: Strategy::Union,
            index: String::new(),
        })
    }

    /// Union over the branches of an OR conjunct.
    ///
    /// A sole disjunction is always tried. An OR among other conjuncts is
    /// distributed over them when nothing else constrains an index.
    fn disjunction_candidate(
        &self,
        record_type: &RecordType,
        conjuncts: &[Conjunct],
        sort: &[String],
        candidates: &[Candidate],
        allow_in_as_or: bool,
    ) -> Option<Candidate> {
        let (position, branches) = conjuncts.iter().enumerate().find_map(|(i, c)| match &c.kind {
            ConjunctKind::Or(branches) => Some((i, branches)),
            _ => None,
        })?;

        let branch_predicates: Vec<Vec<Arc<QueryPredicate>>> = if conjuncts.len() == 1 {
            branches.iter().map(|b| b.conjuncts()).collect()
        } else if self.config.attempt_or_distribution && candidates.iter().all(|c| c.matched == 0)
        {
            let rest: Vec<Arc<QueryPredicate>> = conjuncts
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != position)
                .map(|(_, c)| c.predicate.clone())
                .collect();
            branches
                .iter()
                .map(|b| {
                    let mut predicates = b.conjuncts();
                    predicates.extend(rest.iter().cloned());
                    predicates
                })
                .collect()
        } else {
            return None;
        };

        let mut children = Vec::new();
        let mut orderings = Vec::new();
        let mut matched = usize::MAX;
        for predicates in &branch_predicates {
            let best = self
                .plan_conjuncts(record_type, predicates, sort, allow_in_as_or)
                .into_iter()
                .next()
                .filter(|b| b.matched > 0)?;
            matched = matched.min(best.matched);
            orderings.push(best.ordering);
            children.push(best.plan);
        }
        let branch_count = children.len();

        let (plan, ordering) = match union_ordering(record_type, &orderings, sort) {
            Some(ordering) => (QueryPlan::union(children, ordering.keys.clone()), ordering),
            None if sort.is_empty() => (
                QueryPlan::distinct(Arc::new(QueryPlan::unordered_union(children))),
                PlanOrdering::default(),
            ),
            None => return None,
        };
        log_debug!(
            component = "planner",
            event = "union_planned",
            branches = branch_count,
            ordered = matches!(plan, QueryPlan::Union { .. }),
        );
        Some(Candidate {
            plan: Arc::new(plan),
            ordering,
            matched,
            strategy: Strategy::Union,
            index: String::new(),
        })
    }
}

/// Record scan with every conjunct as a filter
fn scan_candidate(record_type: &RecordType, predicates: &[Arc<QueryPredicate>]) -> Candidate {
    let scan = QueryPlan::scan(record_type.name.clone());
    let plan = if predicates.is_empty() {
        scan
    } else {
        QueryPlan::filter(Arc::new(scan), predicates.to_vec())
    };
    Candidate {
        plan: Arc::new(plan),
        ordering: PlanOrdering::new(vec![record_type.primary_key.clone()]),
        matched: 0,
        strategy: Strategy::Scan,
        index: String::new(),
    }
}

/// Common ordering of union branches that yields `sort`.
///
/// The merge key must end in the primary key so equal records meet and
/// collapse, and must not read repeated fields.
fn union_ordering(
    record_type: &RecordType,
    orderings: &[PlanOrdering],
    sort: &[String],
) -> Option<PlanOrdering> {
    let mut merged = PlanOrdering::merged(orderings)?;
    if merged.keys.iter().any(|k| record_type.is_repeated(k)) {
        return None;
    }
    if !merged.keys.contains(&record_type.primary_key) {
        merged.keys.push(record_type.primary_key.clone());
    }
    merged.satisfies(sort).then_some(merged)
}

/// First unused conjunct `select` accepts
fn find_unused<T>(
    conjuncts: &[Conjunct],
    used: &[bool],
    select: impl Fn(&ConjunctKind) -> Option<T>,
) -> Option<(usize, T)> {
    conjuncts
        .iter()
        .enumerate()
        .filter(|(i, _)| !used[*i])
        .find_map(|(i, c)| select(&c.kind).map(|t| (i, t)))
}

/// IN-join over the IN conjunct at `position`.
///
/// The binding is numbered by how many earlier IN conjuncts name the same
/// field, so repeated planning of one query yields the same identifiers.
fn pending_join(
    conjuncts: &[Conjunct],
    position: usize,
    field: &str,
    comparison: &Comparison,
) -> Option<PendingJoin> {
    let source = match &comparison.operand {
        Operand::LiteralList(values) => InSource::Values(sorted_values(values)),
        Operand::Parameter(name) => InSource::Parameter(name.clone()),
        _ => return None,
    };
    let earlier = conjuncts[..position]
        .iter()
        .filter(|c| match &c.kind {
            ConjunctKind::In { field: f, .. } | ConjunctKind::OneOfThemIn { field: f, .. } => {
                f == field
            }
            _ => false,
        })
        .count();
    Some(PendingJoin {
        field: field.to_string(),
        binding: CorrelationIdentifier::in_binding(field, earlier),
        source,
        position,
    })
}

/// Ascending, without duplicates
fn sorted_values(values: &[Json]) -> Vec<Json> {
    let mut sorted = values.to_vec();
    sorted.sort_by(compare_json);
    sorted.dedup_by(|a, b| compare_json(a, b) == Ordering::Equal);
    sorted
}

/// Every index combination over lists of the given lengths, first list
/// varying slowest
fn combinations(lengths: &[usize]) -> Vec<Vec<usize>> {
    let mut result = Vec::new();
    if lengths.iter().any(|l| *l == 0) {
        return result;
    }
    let mut current = vec![0; lengths.len()];
    loop {
        result.push(current.clone());
        let mut slot = lengths.len();
        loop {
            if slot == 0 {
                return result;
            }
            slot -= 1;
            current[slot] += 1;
            if current[slot] < lengths[slot] {
                break;
            }
            current[slot] = 0;
        }
    }
}
