//! Query executor
//!
//! Runs physical plans as pull-based cursors that can stop after any record
//! and resume later from an opaque continuation token.
//!
//! # Invariants
//!
//! - Deterministic: same plan, bindings and store contents, same records in
//!   the same order
//! - Resumable: a continuation resumes after the last returned record with no
//!   record repeated or skipped
//! - Checked: a continuation from a plan with a different continuation hash
//!   is rejected, never silently applied

mod continuation;
mod cursor;
mod errors;
mod executor;
mod result;

pub use continuation::{Continuation, ContinuationError, CursorPosition};
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use executor::{ExecuteProperties, PlanCursor, QueryExecutor};
pub use result::ExecutionResult;

pub use crate::expr::EvaluationContext;
