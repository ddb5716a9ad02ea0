//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Flow setpoint outside the accepted range
    #[error("Invalid target flow: {value} (expected 0 to {})", crate::pump::MAX_TARGET_FLOW)]
    InvalidTargetFlow { value: f64 },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
