//! Query executor for recordplan
//!
//! Runs a plan against a `RecordStore`, producing records in plan order.
//!
//! Execution flow:
//! 1. Decode and validate the continuation, if any
//! 2. Open one cursor per plan node, resuming at the decoded position
//! 3. Pull records until the limit or exhaustion
//! 4. Encode the position reached as the next continuation
//!
//! Same plan, same bindings and same store contents give the same records in
//! the same order, across any pagination.

use crate::expr::EvaluationContext;
use crate::index::{RecordStore, StoredRecord};
use crate::observability::log_warn;
use crate::plan::{PlanHashKind, PlanHashable, QueryPlan};

use super::continuation::Continuation;
use super::cursor::{open_cursor, BoxedCursor, ExecutionStats};
use super::errors::{ExecutorError, ExecutorResult};
use super::result::ExecutionResult;

/// Per-execution options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteProperties {
    /// Maximum records to return
    pub limit: Option<usize>,
    /// Token from a previous execution of a compatible plan
    pub continuation: Option<Vec<u8>>,
}

impl ExecuteProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the record limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resumes from a continuation
    pub fn with_continuation(mut self, continuation: Vec<u8>) -> Self {
        self.continuation = Some(continuation);
        self
    }
}

/// Query executor over a record store
pub struct QueryExecutor<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new executor
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Opens a pull-based cursor over `plan`.
    ///
    /// A continuation produced by a plan with a different continuation hash
    /// is rejected with `EXEC_CONTINUATION_MISMATCH`.
    pub fn open<'p>(
        &self,
        plan: &'p QueryPlan,
        ctx: &EvaluationContext,
        continuation: Option<&[u8]>,
    ) -> ExecutorResult<PlanCursor<'p>>
    where
        'a: 'p,
    {
        let plan_hash = plan.plan_hash(PlanHashKind::ForContinuation);
        let position = match continuation {
            Some(bytes) => {
                let token = Continuation::from_bytes(bytes)
                    .and_then(|token| token.validate_for(plan).map(|_| token))
                    .map_err(|e| {
                        let err = ExecutorError::from(e);
                        log_warn!(
                            component = "executor",
                            event = "continuation_rejected",
                            plan_hash,
                            code = %err.code(),
                        );
                        err
                    })?;
                Some(token.position)
            }
            None => None,
        };
        let cursor = open_cursor(self.store, plan, ctx.clone(), position.as_ref())?;
        Ok(PlanCursor {
            cursor,
            plan,
            stats: ExecutionStats::default(),
            exhausted: false,
        })
    }

    /// Executes `plan`, returning at most `props.limit` records.
    pub fn execute(
        &self,
        plan: &QueryPlan,
        ctx: &EvaluationContext,
        props: &ExecuteProperties,
    ) -> ExecutorResult<ExecutionResult> {
        let mut cursor = self.open(plan, ctx, props.continuation.as_deref())?;
        let mut records = Vec::new();
        while props.limit.map_or(true, |limit| records.len() < limit) {
            match cursor.next()? {
                Some(record) => records.push(record),
                None => break,
            }
        }
        Ok(ExecutionResult {
            records,
            scanned_count: cursor.scanned_count(),
            discarded_count: cursor.discarded_count(),
            continuation: cursor.continuation()?,
        })
    }
}

/// An open execution of one plan
pub struct PlanCursor<'p> {
    cursor: BoxedCursor<'p>,
    plan: &'p QueryPlan,
    stats: ExecutionStats,
    exhausted: bool,
}

impl PlanCursor<'_> {
    /// Next record in plan order, `None` once exhausted
    pub fn next(&mut self) -> ExecutorResult<Option<StoredRecord>> {
        if self.exhausted {
            return Ok(None);
        }
        let record = self.cursor.next(&mut self.stats)?;
        self.exhausted = record.is_none();
        Ok(record)
    }

    /// Token resuming right after the last returned record; `None` once the
    /// cursor has reported exhaustion.
    pub fn continuation(&self) -> ExecutorResult<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }
        let token = Continuation::new(self.plan, self.cursor.position());
        Ok(Some(token.to_bytes()?))
    }

    /// Records fetched from the store so far
    pub fn scanned_count(&self) -> usize {
        self.stats.scanned
    }

    /// Records rejected by residual filters so far
    pub fn discarded_count(&self) -> usize {
        self.stats.discarded
    }
}
