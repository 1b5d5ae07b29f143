//! Planner error types
//!
//! Error codes:
//! - PLAN_UNKNOWN_RECORD_TYPE (REJECT)
//! - PLAN_INVALID_FIELD (REJECT)
//! - PLAN_TYPE_MISMATCH (REJECT)
//! - PLAN_SORT_NOT_SATISFIABLE (REJECT)
//! - PLAN_INVALID_QUERY (REJECT)
//!
//! Every planner error is structural: planning aborts and no partial plan is
//! returned.

use std::fmt;

/// Severity levels for planner errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client request rejected
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Planner-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Query names a record type the metadata lacks
    PlanUnknownRecordType,
    /// Field reference outside the record type's declared shape
    PlanInvalidField,
    /// Comparison operand or field kind does not fit the operator
    PlanTypeMismatch,
    /// No index or primary key order yields the requested sort
    PlanSortNotSatisfiable,
    /// Malformed query structure
    PlanInvalidQuery,
}

impl PlannerErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::PlanUnknownRecordType => "PLAN_UNKNOWN_RECORD_TYPE",
            PlannerErrorCode::PlanInvalidField => "PLAN_INVALID_FIELD",
            PlannerErrorCode::PlanTypeMismatch => "PLAN_TYPE_MISMATCH",
            PlannerErrorCode::PlanSortNotSatisfiable => "PLAN_SORT_NOT_SATISFIABLE",
            PlannerErrorCode::PlanInvalidQuery => "PLAN_INVALID_QUERY",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error type with full context
#[derive(Debug, Clone)]
pub struct PlannerError {
    /// Error code
    code: PlannerErrorCode,
    /// Human-readable message
    message: String,
    /// Field name if applicable
    field: Option<String>,
}

impl PlannerError {
    /// Create an unknown record type error
    pub fn unknown_record_type(name: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::PlanUnknownRecordType,
            message: format!("Record type '{}' not found", name.into()),
            field: None,
        }
    }

    /// Create an invalid field error
    pub fn invalid_field(record_type: &str, field: impl Into<String>) -> Self {
        let f = field.into();
        Self {
            code: PlannerErrorCode::PlanInvalidField,
            message: format!("Record type '{}' has no field '{}'", record_type, f),
            field: Some(f),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let f = field.into();
        Self {
            code: PlannerErrorCode::PlanTypeMismatch,
            message: format!("Field '{}': {}", f, reason.into()),
            field: Some(f),
        }
    }

    /// Create a sort not satisfiable error
    pub fn sort_not_satisfiable(sort: &[String]) -> Self {
        Self {
            code: PlannerErrorCode::PlanSortNotSatisfiable,
            message: format!("No index produces records ordered by [{}]", sort.join(", ")),
            field: sort.first().cloned(),
        }
    }

    /// Create an invalid query error
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::PlanInvalidQuery,
            message: reason.into(),
            field: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> PlannerErrorCode {
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

    /// Returns the field name if applicable
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for PlannerError {
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

impl std::error::Error for PlannerError {}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
