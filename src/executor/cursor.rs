//! Record cursors, one per plan node
//!
//! Cursors are pull-based. Each reports its position as a `CursorPosition`,
//! which reopens the same plan node right after the last record it returned.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::expr::{
    Comparison, ComparisonType, CorrelationIdentifier, EvaluationContext, QueryPredicate,
};
use crate::index::{
    compare_json, IndexEntry, IndexIter, IndexKey, RecordIter, RecordStore, StoredRecord,
    TupleRange,
};
use crate::plan::{InSource, QueryPlan, ScanComparisons};

use super::continuation::{ContinuationError, CursorPosition};
use super::errors::{ExecutorError, ExecutorResult};

/// Counters shared by every cursor of one execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ExecutionStats {
    /// Records fetched from the store
    pub scanned: usize,
    /// Fetched records rejected by a residual filter
    pub discarded: usize,
}

pub(crate) trait RecordCursor {
    /// Next record, `None` once exhausted
    fn next(&mut self, stats: &mut ExecutionStats) -> ExecutorResult<Option<StoredRecord>>;

    /// Position right after the last record returned
    fn position(&self) -> CursorPosition;
}

pub(crate) type BoxedCursor<'a> = Box<dyn RecordCursor + 'a>;

fn shape_error(position: &CursorPosition) -> ExecutorError {
    ContinuationError::Shape(position.kind().to_string()).into()
}

/// Opens a cursor for `plan`, resuming at `position` when given.
pub(crate) fn open_cursor<'a>(
    store: &'a dyn RecordStore,
    plan: &'a QueryPlan,
    ctx: EvaluationContext,
    position: Option<&CursorPosition>,
) -> ExecutorResult<BoxedCursor<'a>> {
    if let Some(CursorPosition::Exhausted) = position {
        return Ok(Box::new(ExhaustedCursor));
    }
    match plan {
        QueryPlan::Scan { record_type } => {
            let after = match position {
                None => None,
                Some(CursorPosition::Scan { after }) => after.clone(),
                Some(other) => return Err(shape_error(other)),
            };
            let iter = store.scan_records(record_type, after.as_ref())?;
            Ok(Box::new(ScanCursor { iter, last: after }))
        }
        QueryPlan::IndexScan { index, comparisons } => {
            let after = match position {
                None => None,
                Some(CursorPosition::Index { after }) => after.clone(),
                Some(other) => return Err(shape_error(other)),
            };
            let iter = match scan_range(comparisons, &ctx)? {
                Some(range) => Some(store.scan_index(index, range, after.as_ref())?),
                None => None,
            };
            Ok(Box::new(IndexCursor { iter, last: after }))
        }
        QueryPlan::Filter { child, predicates } => {
            let child_cursor = open_cursor(store, child, ctx.clone(), position)?;
            Ok(Box::new(FilterCursor {
                child: child_cursor,
                predicates,
                ctx,
            }))
        }
        QueryPlan::InJoin {
            child,
            binding,
            source,
        } => InJoinCursor::open(store, child, binding, source, ctx, position)
            .map(|c| Box::new(c) as BoxedCursor<'a>),
        QueryPlan::Union {
            children,
            comparison_key,
        } => OrderedUnionCursor::open(store, children, comparison_key, ctx, position)
            .map(|c| Box::new(c) as BoxedCursor<'a>),
        QueryPlan::UnorderedUnion { children } => {
            ConcatCursor::open(store, children, ctx, position)
                .map(|c| Box::new(c) as BoxedCursor<'a>)
        }
        QueryPlan::PrimaryKeyDistinct { child } => {
            let (seen, inner) = match position {
                None => (BTreeSet::new(), None),
                Some(CursorPosition::Distinct { seen, inner }) => {
                    (seen.iter().cloned().collect(), Some(inner.as_ref()))
                }
                Some(other) => return Err(shape_error(other)),
            };
            let child_cursor = open_cursor(store, child, ctx, inner)?;
            Ok(Box::new(DistinctCursor {
                child: child_cursor,
                seen,
            }))
        }
    }
}

struct ExhaustedCursor;

impl RecordCursor for ExhaustedCursor {
    fn next(&mut self, _stats: &mut ExecutionStats) -> ExecutorResult<Option<StoredRecord>> {
        Ok(None)
    }

    fn position(&self) -> CursorPosition {
        CursorPosition::Exhausted
    }
}

// =============================================================================
// Scans
// =============================================================================

struct ScanCursor<'a> {
    iter: RecordIter<'a>,
    last: Option<IndexKey>,
}

impl RecordCursor for ScanCursor<'_> {
    fn next(&mut self, stats: &mut ExecutionStats) -> ExecutorResult<Option<StoredRecord>> {
        match self.iter.next() {
            Some(record) => {
                stats.scanned += 1;
                self.last = Some(record.primary_key.clone());
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn position(&self) -> CursorPosition {
        CursorPosition::Scan {
            after: self.last.clone(),
        }
    }
}

/// `iter` is `None` when an operand resolved to nothing, which matches no entry
struct IndexCursor<'a> {
    iter: Option<IndexIter<'a>>,
    last: Option<IndexEntry>,
}

impl RecordCursor for IndexCursor<'_> {
    fn next(&mut self, stats: &mut ExecutionStats) -> ExecutorResult<Option<StoredRecord>> {
        let iter = match self.iter.as_mut() {
            Some(iter) => iter,
            None => return Ok(None),
        };
        match iter.next() {
            Some((entry, record)) => {
                stats.scanned += 1;
                self.last = Some(entry);
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn position(&self) -> CursorPosition {
        CursorPosition::Index {
            after: self.last.clone(),
        }
    }
}

/// Index key for a bound operand; `None` when unbound or null.
fn operand_key(
    comparison: &Comparison,
    ctx: &EvaluationContext,
) -> ExecutorResult<Option<IndexKey>> {
    match comparison.resolve_scalar(ctx) {
        None | Some(Json::Null) => Ok(None),
        Some(value) => IndexKey::from_json(value).map(Some).ok_or_else(|| {
            ExecutorError::malformed_value(format!(
                "'{}' cannot bound an index scan",
                value
            ))
        }),
    }
}

/// Range an index scan covers; `None` when it can match nothing.
fn scan_range(
    comparisons: &ScanComparisons,
    ctx: &EvaluationContext,
) -> ExecutorResult<Option<TupleRange>> {
    let mut prefix = Vec::with_capacity(comparisons.equality.len());
    for comparison in &comparisons.equality {
        match operand_key(comparison, ctx)? {
            Some(key) => prefix.push(key),
            None => return Ok(None),
        }
    }

    let mut low = Bound::Unbounded;
    let mut high = Bound::Unbounded;
    for comparison in &comparisons.inequality {
        let key = match operand_key(comparison, ctx)? {
            Some(key) => key,
            None => return Ok(None),
        };
        match comparison.op {
            ComparisonType::GreaterThan => low = tighter_low(low, Bound::Excluded(key)),
            ComparisonType::GreaterThanOrEquals => low = tighter_low(low, Bound::Included(key)),
            ComparisonType::LessThan => high = tighter_high(high, Bound::Excluded(key)),
            ComparisonType::LessThanOrEquals => high = tighter_high(high, Bound::Included(key)),
            _ => {}
        }
    }
    // null never satisfies a range comparison
    if matches!(low, Bound::Unbounded) && !matches!(high, Bound::Unbounded) {
        low = Bound::Excluded(IndexKey::Null);
    }
    Ok(Some(TupleRange::prefix(prefix).with_bounds(low, high)))
}

fn tighter_low(current: Bound<IndexKey>, new: Bound<IndexKey>) -> Bound<IndexKey> {
    match (&current, &new) {
        (Bound::Unbounded, _) => new,
        (_, Bound::Unbounded) => current,
        (
            Bound::Included(a) | Bound::Excluded(a),
            Bound::Included(b) | Bound::Excluded(b),
        ) => match b.cmp(a) {
            Ordering::Greater => new,
            Ordering::Less => current,
            Ordering::Equal if matches!(new, Bound::Excluded(_)) => new,
            Ordering::Equal => current,
        },
    }
}

fn tighter_high(current: Bound<IndexKey>, new: Bound<IndexKey>) -> Bound<IndexKey> {
    match (&current, &new) {
        (Bound::Unbounded, _) => new,
        (_, Bound::Unbounded) => current,
        (
            Bound::Included(a) | Bound::Excluded(a),
            Bound::Included(b) | Bound::Excluded(b),
        ) => match b.cmp(a) {
            Ordering::Less => new,
            Ordering::Greater => current,
            Ordering::Equal if matches!(new, Bound::Excluded(_)) => new,
            Ordering::Equal => current,
        },
    }
}

// =============================================================================
// Filter
// =============================================================================

struct FilterCursor<'a> {
    child: BoxedCursor<'a>,
    predicates: &'a [Arc<QueryPredicate>],
    ctx: EvaluationContext,
}

impl FilterCursor<'_> {
    fn accepts(&self, record: &StoredRecord) -> ExecutorResult<bool> {
        for predicate in self.predicates {
            if predicate.eval(&self.ctx, record.body())? != Some(true) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl RecordCursor for FilterCursor<'_> {
    fn next(&mut self, stats: &mut ExecutionStats) -> ExecutorResult<Option<StoredRecord>> {
        while let Some(record) = self.child.next(stats)? {
            if self.accepts(&record)? {
                return Ok(Some(record));
            }
            stats.discarded += 1;
        }
        Ok(None)
    }

    fn position(&self) -> CursorPosition {
        self.child.position()
    }
}

// =============================================================================
// IN-join
// =============================================================================

/// Runs the child once per source value, ascending, with the binding set.
struct InJoinCursor<'a> {
    store: &'a dyn RecordStore,
    child: &'a QueryPlan,
    binding: &'a CorrelationIdentifier,
    ctx: EvaluationContext,
    values: Vec<Json>,
    index: usize,
    inner: Option<BoxedCursor<'a>>,
}

impl<'a> InJoinCursor<'a> {
    fn open(
        store: &'a dyn RecordStore,
        child: &'a QueryPlan,
        binding: &'a CorrelationIdentifier,
        source: &'a InSource,
        ctx: EvaluationContext,
        position: Option<&CursorPosition>,
    ) -> ExecutorResult<Self> {
        let values = join_values(source, &ctx)?;
        let mut cursor = Self {
            store,
            child,
            binding,
            ctx,
            values,
            index: 0,
            inner: None,
        };
        match position {
            None => {}
            Some(CursorPosition::InJoin { value, inner, .. }) => {
                cursor.index = cursor
                    .values
                    .partition_point(|v| compare_json(v, value) == Ordering::Less);
                let resumes_same_value = cursor
                    .values
                    .get(cursor.index)
                    .map_or(false, |v| compare_json(v, value) == Ordering::Equal);
                if resumes_same_value {
                    cursor.inner = Some(cursor.open_inner(inner.as_deref())?);
                }
            }
            Some(other) => return Err(shape_error(other)),
        }
        Ok(cursor)
    }

    fn open_inner(&self, position: Option<&CursorPosition>) -> ExecutorResult<BoxedCursor<'a>> {
        let value = self.values[self.index].clone();
        let ctx = self.ctx.with_correlation(self.binding.clone(), value);
        open_cursor(self.store, self.child, ctx, position)
    }
}

/// Join values, sorted ascending without duplicates
fn join_values(source: &InSource, ctx: &EvaluationContext) -> ExecutorResult<Vec<Json>> {
    let mut values = match source {
        InSource::Values(values) => values.clone(),
        InSource::Parameter(name) => match ctx.parameter(name) {
            None => return Err(ExecutorError::missing_binding(name)),
            Some(Json::Null) => Vec::new(),
            Some(Json::Array(values)) => values.clone(),
            Some(other) => {
                return Err(ExecutorError::malformed_value(format!(
                    "parameter '{}' must be a list for IN, found {}",
                    name, other
                )))
            }
        },
    };
    values.sort_by(compare_json);
    values.dedup_by(|a, b| compare_json(a, b) == Ordering::Equal);
    Ok(values)
}

impl RecordCursor for InJoinCursor<'_> {
    fn next(&mut self, stats: &mut ExecutionStats) -> ExecutorResult<Option<StoredRecord>> {
        while self.index < self.values.len() {
            if self.inner.is_none() {
                self.inner = Some(self.open_inner(None)?);
            }
            let next = match self.inner.as_mut() {
                Some(inner) => inner.next(stats)?,
                None => None,
            };
            match next {
                Some(record) => return Ok(Some(record)),
                None => {
                    self.inner = None;
                    self.index += 1;
                }
            }
        }
        Ok(None)
    }

    fn position(&self) -> CursorPosition {
        match self.values.get(self.index) {
            Some(value) => CursorPosition::InJoin {
                index: self.index,
                value: value.clone(),
                inner: self.inner.as_ref().map(|c| Box::new(c.position())),
            },
            None => CursorPosition::Exhausted,
        }
    }
}

// =============================================================================
// Unions
// =============================================================================

struct UnionBranch<'a> {
    cursor: BoxedCursor<'a>,
    /// Fetched record not yet returned
    head: Option<StoredRecord>,
    /// Branch position before `head` was fetched
    before_head: CursorPosition,
    /// `head` was consumed and the branch must fetch again
    stale: bool,
}

impl UnionBranch<'_> {
    fn position(&self) -> CursorPosition {
        if self.stale {
            self.cursor.position()
        } else {
            self.before_head.clone()
        }
    }
}

/// Merges ordered branches by comparison key. Records with equal keys from
/// different branches are returned once, from the lowest branch.
struct OrderedUnionCursor<'a> {
    branches: Vec<UnionBranch<'a>>,
    comparison_key: &'a [String],
}

impl<'a> OrderedUnionCursor<'a> {
    fn open(
        store: &'a dyn RecordStore,
        children: &'a [Arc<QueryPlan>],
        comparison_key: &'a [String],
        ctx: EvaluationContext,
        position: Option<&CursorPosition>,
    ) -> ExecutorResult<Self> {
        let positions: Vec<Option<&CursorPosition>> = match position {
            None => vec![None; children.len()],
            Some(CursorPosition::OrderedUnion { children: saved })
                if saved.len() == children.len() =>
            {
                saved.iter().map(Some).collect()
            }
            Some(other) => return Err(shape_error(other)),
        };
        let mut branches = Vec::with_capacity(children.len());
        for (child, position) in children.iter().zip(positions) {
            let cursor = open_cursor(store, child, ctx.clone(), position)?;
            let before_head = cursor.position();
            branches.push(UnionBranch {
                cursor,
                head: None,
                before_head,
                stale: true,
            });
        }
        Ok(Self {
            branches,
            comparison_key,
        })
    }

    fn compare(&self, a: &StoredRecord, b: &StoredRecord) -> Ordering {
        let null = Json::Null;
        for field in self.comparison_key {
            let ord = compare_json(
                a.field(field).unwrap_or(&null),
                b.field(field).unwrap_or(&null),
            );
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl RecordCursor for OrderedUnionCursor<'_> {
    fn next(&mut self, stats: &mut ExecutionStats) -> ExecutorResult<Option<StoredRecord>> {
        for branch in &mut self.branches {
            if branch.stale {
                branch.before_head = branch.cursor.position();
                branch.head = branch.cursor.next(stats)?;
                branch.stale = false;
            }
        }

        let mut winner: Option<usize> = None;
        for (i, branch) in self.branches.iter().enumerate() {
            let head = match &branch.head {
                Some(head) => head,
                None => continue,
            };
            let better = match winner.and_then(|w| self.branches[w].head.as_ref()) {
                Some(best) => self.compare(head, best) == Ordering::Less,
                None => true,
            };
            if better {
                winner = Some(i);
            }
        }
        let winner = match winner {
            Some(w) => w,
            None => return Ok(None),
        };

        let record = self.branches[winner].head.take();
        self.branches[winner].stale = true;
        if let Some(record) = &record {
            for i in winner + 1..self.branches.len() {
                let duplicate = match &self.branches[i].head {
                    Some(head) => self.compare(head, record) == Ordering::Equal,
                    None => false,
                };
                if duplicate {
                    self.branches[i].head = None;
                    self.branches[i].stale = true;
                }
            }
        }
        Ok(record)
    }

    fn position(&self) -> CursorPosition {
        CursorPosition::OrderedUnion {
            children: self.branches.iter().map(UnionBranch::position).collect(),
        }
    }
}

/// Runs branches one after another, opening each lazily.
struct ConcatCursor<'a> {
    store: &'a dyn RecordStore,
    children: &'a [Arc<QueryPlan>],
    ctx: EvaluationContext,
    branch: usize,
    current: Option<BoxedCursor<'a>>,
}

impl<'a> ConcatCursor<'a> {
    fn open(
        store: &'a dyn RecordStore,
        children: &'a [Arc<QueryPlan>],
        ctx: EvaluationContext,
        position: Option<&CursorPosition>,
    ) -> ExecutorResult<Self> {
        let mut cursor = Self {
            store,
            children,
            ctx,
            branch: 0,
            current: None,
        };
        match position {
            None => {}
            Some(CursorPosition::Concat { branch, inner }) if *branch < children.len() => {
                cursor.branch = *branch;
                if let Some(inner) = inner {
                    cursor.current = Some(open_cursor(
                        store,
                        &children[*branch],
                        cursor.ctx.clone(),
                        Some(inner),
                    )?);
                }
            }
            Some(other) => return Err(shape_error(other)),
        }
        Ok(cursor)
    }
}

impl RecordCursor for ConcatCursor<'_> {
    fn next(&mut self, stats: &mut ExecutionStats) -> ExecutorResult<Option<StoredRecord>> {
        while self.branch < self.children.len() {
            if self.current.is_none() {
                self.current = Some(open_cursor(
                    self.store,
                    &self.children[self.branch],
                    self.ctx.clone(),
                    None,
                )?);
            }
            let next = match self.current.as_mut() {
                Some(current) => current.next(stats)?,
                None => None,
            };
            match next {
                Some(record) => return Ok(Some(record)),
                None => {
                    self.current = None;
                    self.branch += 1;
                }
            }
        }
        Ok(None)
    }

    fn position(&self) -> CursorPosition {
        if self.branch >= self.children.len() {
            return CursorPosition::Exhausted;
        }
        CursorPosition::Concat {
            branch: self.branch,
            inner: self.current.as_ref().map(|c| Box::new(c.position())),
        }
    }
}

// =============================================================================
// Distinct
// =============================================================================

struct DistinctCursor<'a> {
    child: BoxedCursor<'a>,
    seen: BTreeSet<IndexKey>,
}

impl RecordCursor for DistinctCursor<'_> {
    fn next(&mut self, stats: &mut ExecutionStats) -> ExecutorResult<Option<StoredRecord>> {
        while let Some(record) = self.child.next(stats)? {
            if self.seen.insert(record.primary_key.clone()) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn position(&self) -> CursorPosition {
        CursorPosition::Distinct {
            seen: self.seen.iter().cloned().collect(),
            inner: Box::new(self.child.position()),
        }
    }
}
