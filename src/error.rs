//! Error types for loopwarden
//!
//! Lifecycle errors are returned to the caller of the failing call. Errors raised by
//! a loop's own work never leave the loop's task; they travel on the event channel
//! as [`LoopExecutionError`].

use serde::Serialize;
use thiserror::Error;

/// Errors returned by engine operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A mutating call arrived after `dispose()`
    #[error("Engine already disposed")]
    AlreadyDisposed,

    /// A live loop is already registered under this identifier
    #[error("Duplicate loop identifier: {0}")]
    DuplicateIdentifier(String),

    /// Loop identifiers must be non-empty
    #[error("Invalid loop identifier: identifier must not be empty")]
    InvalidIdentifier,

    /// Schedule cannot be driven (e.g. zero period)
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

/// Errors returned by a loop's work for a single execution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    /// Execution failed; the loop's error policy decides what happens next
    #[error("{0}")]
    Fail(String),

    /// Execution failed and the loop must not run again
    #[error("fatal: {0}")]
    Fatal(String),

    /// Work observed its stop signal and exited early
    #[error("canceled")]
    Canceled,
}

impl LoopError {
    /// Shorthand for [`LoopError::Fail`]
    pub fn fail(msg: impl Into<String>) -> Self {
        Self::Fail(msg.into())
    }

    /// Shorthand for [`LoopError::Fatal`]
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// A failed execution, caught at the loop boundary and reported on the event channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("Loop {loop_id} failed on tick {tick}: {message}")]
pub struct LoopExecutionError {
    /// Loop that failed
    pub loop_id: String,
    /// 1-based execution counter
    pub tick: u64,
    /// Rendered error or panic payload
    pub message: String,
    /// The work panicked instead of returning an error
    pub panicked: bool,
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_disposed_error() {
        let err = EngineError::AlreadyDisposed;
        assert_eq!(err.to_string(), "Engine already disposed");
    }

    #[test]
    fn test_duplicate_identifier_error() {
        let err = EngineError::DuplicateIdentifier("ping".to_string());
        assert_eq!(err.to_string(), "Duplicate loop identifier: ping");
    }

    #[test]
    fn test_invalid_schedule_error() {
        let err = EngineError::InvalidSchedule("period must be non-zero".to_string());
        assert_eq!(err.to_string(), "Invalid schedule: period must be non-zero");
    }

    #[test]
    fn test_loop_error_constructors() {
        assert_eq!(LoopError::fail("boom"), LoopError::Fail("boom".to_string()));
        assert!(LoopError::fatal("gone").is_fatal());
        assert!(!LoopError::fail("boom").is_fatal());
        assert!(!LoopError::Canceled.is_fatal());
    }

    #[test]
    fn test_loop_error_display() {
        assert_eq!(LoopError::fail("boom").to_string(), "boom");
        assert_eq!(LoopError::fatal("gone").to_string(), "fatal: gone");
        assert_eq!(LoopError::Canceled.to_string(), "canceled");
    }

    #[test]
    fn test_execution_error_display() {
        let err = LoopExecutionError {
            loop_id: "ping".to_string(),
            tick: 3,
            message: "boom".to_string(),
            panicked: false,
        };
        assert_eq!(err.to_string(), "Loop ping failed on tick 3: boom");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(EngineError::AlreadyDisposed)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
