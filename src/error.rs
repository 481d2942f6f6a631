//! Error types for clubcore.
//!
//! All errors are strongly typed using thiserror so callers can pattern
//! match on the exact rejection. Undo/redo on an empty stack is not an
//! error; see [`crate::history::HistoryOutcome::NoOp`].

use thiserror::Error;

use crate::record::RecordId;

/// Validation errors raised while checking input against a schema, a
/// formula descriptor or a configuration value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' is not declared in the record schema")]
    UnknownField {
        field: String,
    },

    #[error("Field '{field}' expects {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Field '{field}' value {value} is outside [{min}, {max}]")]
    OutOfDomain {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Field '{field}' value '{value}' is not one of the allowed values")]
    NotAllowed {
        field: String,
        value: String,
    },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    FieldTooLong {
        field: String,
        max_length: usize,
    },

    #[error("Invalid schema: {reason}")]
    InvalidSchema {
        reason: String,
    },

    #[error("Invalid formula '{name}': {reason}")]
    InvalidFormula {
        name: String,
        reason: String,
    },

    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex {
        pattern: String,
        reason: String,
    },

    #[error("Invalid scenario: {reason}")]
    InvalidScenario {
        reason: String,
    },

    #[error("Invalid simulation constraints: {reason}")]
    InvalidSimulationConstraints {
        reason: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors raised while applying a command to live state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Record not found: {id}")]
    RecordNotFound {
        id: RecordId,
    },

    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: RecordId,
        expected: u64,
        actual: u64,
    },

    #[error("Simulation limit exceeded: {limit_type} (max: {max_value}, actual: {actual_value})")]
    SimulationLimitExceeded {
        limit_type: String,
        max_value: u64,
        actual_value: u64,
    },

    #[error("Timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },
}

/// Top-level error type for clubcore.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl CoreError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Shorthand for a missing record.
    #[must_use]
    pub const fn not_found(id: RecordId) -> Self {
        Self::Execution(ExecutionError::RecordNotFound { id })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this error reports a missing record.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Execution(ExecutionError::RecordNotFound { .. })
        )
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if retrying the same command after a refresh may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Execution(ExecutionError::VersionConflict { .. })
        )
    }
}

/// Result type alias for clubcore operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_out_of_domain() {
        let err = ValidationError::OutOfDomain {
            field: "engagement".to_string(),
            value: 140.0,
            min: 0.0,
            max: 100.0,
        };
        let msg = format!("{err}");
        assert!(msg.contains("engagement"));
        assert!(msg.contains("140"));
        assert!(msg.contains("outside"));
    }

    #[test]
    fn execution_error_record_not_found() {
        let id = RecordId::new();
        let err = ExecutionError::RecordNotFound { id };
        assert!(format!("{err}").contains("Record not found"));
    }

    #[test]
    fn execution_error_simulation_limit() {
        let err = ExecutionError::SimulationLimitExceeded {
            limit_type: "steps".to_string(),
            max_value: 16,
            actual_value: 20,
        };
        let msg = format!("{err}");
        assert!(msg.contains("steps"));
        assert!(msg.contains("16"));
        assert!(msg.contains("20"));
    }

    #[test]
    fn core_error_from_validation() {
        let err: CoreError = ValidationError::MissingField {
            field: "name".to_string(),
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn core_error_not_found() {
        let err = CoreError::not_found(RecordId::new());
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn version_conflict_is_retryable() {
        let err: CoreError = ExecutionError::VersionConflict {
            id: RecordId::new(),
            expected: 2,
            actual: 3,
        }
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn core_error_internal() {
        let err = CoreError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(format!("{err}").contains("unexpected state"));
    }
}
