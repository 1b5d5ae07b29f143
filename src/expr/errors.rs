//! Expression evaluation errors

use thiserror::Error;

/// Failure while evaluating a predicate against a record.
///
/// Absent data evaluates to unknown; these errors cover operands whose bound
/// value has the wrong shape for the comparison.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// IN over a parameter bound to a non-list value
    #[error("parameter '{name}' must be bound to a list for IN, found {found}")]
    ParameterNotAList { name: String, found: String },

    /// IN over a correlation bound to a non-list value
    #[error("correlation '{name}' must be bound to a list for IN, found {found}")]
    CorrelationNotAList { name: String, found: String },
}

/// Result type for expression evaluation
pub type EvalResult<T> = Result<T, EvalError>;
