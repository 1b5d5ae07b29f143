//! Index and record store error types
//!
//! Error codes:
//! - INDEX_UNKNOWN (ERROR)
//! - INDEX_UNKNOWN_RECORD_TYPE (ERROR)
//! - INDEX_INVALID_PRIMARY_KEY (ERROR)

use std::fmt;

/// Severity levels for index errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation failed but the store is healthy
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Index-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorCode {
    /// No index with the requested name
    IndexUnknown,
    /// No record type with the requested name
    IndexUnknownRecordType,
    /// Record lacks a usable primary key
    IndexInvalidPrimaryKey,
}

impl IndexErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            IndexErrorCode::IndexUnknown => "INDEX_UNKNOWN",
            IndexErrorCode::IndexUnknownRecordType => "INDEX_UNKNOWN_RECORD_TYPE",
            IndexErrorCode::IndexInvalidPrimaryKey => "INDEX_INVALID_PRIMARY_KEY",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl fmt::Display for IndexErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Index error type with full context
#[derive(Debug, Clone)]
pub struct IndexError {
    code: IndexErrorCode,
    message: String,
}

impl IndexError {
    /// Create an unknown index error
    pub fn unknown_index(name: impl Into<String>) -> Self {
        Self {
            code: IndexErrorCode::IndexUnknown,
            message: format!("Index '{}' does not exist", name.into()),
        }
    }

    /// Create an unknown record type error
    pub fn unknown_record_type(name: impl Into<String>) -> Self {
        Self {
            code: IndexErrorCode::IndexUnknownRecordType,
            message: format!("Record type '{}' does not exist", name.into()),
        }
    }

    /// Create an invalid primary key error
    pub fn invalid_primary_key(record_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            code: IndexErrorCode::IndexInvalidPrimaryKey,
            message: format!(
                "Record of type '{}' has no scalar value for primary key '{}'",
                record_type.into(),
                field.into()
            ),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> IndexErrorCode {
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
}

impl fmt::Display for IndexError {
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

impl std::error::Error for IndexError {}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(IndexErrorCode::IndexUnknown.code(), "INDEX_UNKNOWN");
        assert_eq!(
            IndexErrorCode::IndexUnknownRecordType.code(),
            "INDEX_UNKNOWN_RECORD_TYPE"
        );
        assert_eq!(
            IndexErrorCode::IndexInvalidPrimaryKey.code(),
            "INDEX_INVALID_PRIMARY_KEY"
        );
    }

    #[test]
    fn test_error_display() {
        let err = IndexError::unknown_index("by_num");
        let display = format!("{}", err);
        assert!(display.contains("[ERROR]"));
        assert!(display.contains("INDEX_UNKNOWN"));
        assert!(display.contains("by_num"));
    }
}
