//! Executor error types
//!
//! Error codes:
//! - EXEC_MISSING_BINDING (ERROR)
//! - EXEC_MALFORMED_VALUE (ERROR)
//! - EXEC_CONTINUATION_MISMATCH (ERROR)
//! - EXEC_MALFORMED_CONTINUATION (ERROR)
//! - EXEC_UNKNOWN_INDEX (FATAL)
//!
//! An error aborts the execution in flight; records already returned stay
//! valid.

use std::fmt;

use crate::expr::EvalError;
use crate::index::IndexError;

use super::continuation::ContinuationError;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The query cannot proceed with this input
    Error,
    /// The plan does not fit the store it runs against
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Executor-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    /// An IN-join names a parameter with no binding
    ExecMissingBinding,
    /// A bound or stored value has the wrong shape
    ExecMalformedValue,
    /// Continuation produced by a different plan
    ExecContinuationMismatch,
    /// Continuation bytes cannot be decoded
    ExecMalformedContinuation,
    /// Plan references an index or record type the store lacks
    ExecUnknownIndex,
}

impl ExecutorErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::ExecMissingBinding => "EXEC_MISSING_BINDING",
            ExecutorErrorCode::ExecMalformedValue => "EXEC_MALFORMED_VALUE",
            ExecutorErrorCode::ExecContinuationMismatch => "EXEC_CONTINUATION_MISMATCH",
            ExecutorErrorCode::ExecMalformedContinuation => "EXEC_MALFORMED_CONTINUATION",
            ExecutorErrorCode::ExecUnknownIndex => "EXEC_UNKNOWN_INDEX",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::ExecUnknownIndex => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error type with full context
#[derive(Debug, Clone)]
pub struct ExecutorError {
    /// Error code
    code: ExecutorErrorCode,
    /// Human-readable message
    message: String,
}

impl ExecutorError {
    /// Create a missing binding error
    pub fn missing_binding(parameter: &str) -> Self {
        Self {
            code: ExecutorErrorCode::ExecMissingBinding,
            message: format!("Parameter '{}' is not bound", parameter),
        }
    }

    /// Create a malformed value error
    pub fn malformed_value(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::ExecMalformedValue,
            message: reason.into(),
        }
    }

    /// Create a continuation mismatch error
    pub fn continuation_mismatch(expected: i32, found: i32) -> Self {
        Self {
            code: ExecutorErrorCode::ExecContinuationMismatch,
            message: format!(
                "Continuation was produced by plan {}, resuming plan is {}",
                found, expected
            ),
        }
    }

    /// Create a malformed continuation error
    pub fn malformed_continuation(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::ExecMalformedContinuation,
            message: reason.into(),
        }
    }

    /// Create an unknown index error
    pub fn unknown_index(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::ExecUnknownIndex,
            message: reason.into(),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// True if the input data, not the plan, stopped the query
    pub fn is_data_error(&self) -> bool {
        matches!(
            self.code,
            ExecutorErrorCode::ExecMissingBinding | ExecutorErrorCode::ExecMalformedValue
        )
    }

    /// True if the continuation was rejected
    pub fn is_continuation_error(&self) -> bool {
        matches!(
            self.code,
            ExecutorErrorCode::ExecContinuationMismatch
                | ExecutorErrorCode::ExecMalformedContinuation
        )
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for ExecutorError {}

impl From<EvalError> for ExecutorError {
    fn from(err: EvalError) -> Self {
        ExecutorError::malformed_value(err.to_string())
    }
}

impl From<IndexError> for ExecutorError {
    fn from(err: IndexError) -> Self {
        ExecutorError::unknown_index(err.to_string())
    }
}

impl From<ContinuationError> for ExecutorError {
    fn from(err: ContinuationError) -> Self {
        match err {
            ContinuationError::PlanMismatch { expected, found } => {
                ExecutorError::continuation_mismatch(expected, found)
            }
            other => ExecutorError::malformed_continuation(other.to_string()),
        }
    }
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;
