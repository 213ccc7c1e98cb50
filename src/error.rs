//! Error types for FactLog.
//!
//! All errors in FactLog are strongly typed using thiserror.
//! Nothing in the engine is fatal: errors raised by programs are contained
//! per program and surfaced through diagnostics.

use thiserror::Error;

use crate::claim::ProgramId;

/// Validation errors that occur when claims, rules or templates are malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Claim '{name}' contains {count} variable argument(s) and cannot be stored as a fact")]
    VariableInFact {
        name: String,
        count: usize,
    },

    #[error("Claim name cannot be empty")]
    EmptyClaimName,

    #[error("Capture template '{name}' has no capture slot (a variable prefixed with '?')")]
    MissingCaptureSlot {
        name: String,
    },

    #[error("Rule must match at least one pattern")]
    EmptyRule,
}

/// Execution errors raised while evaluating programs and rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Rule callback failed: {message}")]
    CallbackFailed {
        message: String,
    },

    #[error("Rule callback panicked: {message}")]
    CallbackPanicked {
        message: String,
    },

    #[error("Program '{program}' failed to register: {message}")]
    RegistrationFailed {
        program: ProgramId,
        message: String,
    },

    #[error("Tick did not settle after {limit} iterations")]
    SettleLimitExceeded {
        limit: usize,
    },

    #[error("Telemetry unavailable: {message}")]
    TelemetryUnavailable {
        message: String,
    },
}

/// Top-level error type for FactLog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactLogError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl FactLogError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a callback failure, the error a rule body returns to abort itself.
    #[must_use]
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Execution(ExecutionError::CallbackFailed {
            message: message.into(),
        })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

impl From<serde_json::Error> for FactLogError {
    fn from(err: serde_json::Error) -> Self {
        Self::callback(err.to_string())
    }
}

/// Result type alias for FactLog operations.
pub type FactLogResult<T> = Result<T, FactLogError>;
