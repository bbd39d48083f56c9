//! Domain error model.

use thiserror::Error;

/// Result type used across the domain crates.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic business failure.
///
/// Storage and transport failures never end up here; they are wrapped by the
/// infra layer instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The command is well-formed but breaks a rule of the current state.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Not enough stock to cover a sale line or status change.
    #[error("{0}")]
    InsufficientStock(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The named resource does not exist (or was deleted).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Duplicate or stale state (unique names, optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authenticated, but not allowed to touch this record.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn insufficient_stock(msg: impl Into<String>) -> Self {
        Self::InsufficientStock(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound(what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_is_passed_through() {
        let err = DomainError::insufficient_stock("Insufficient stock for Rice. Available: 2");
        assert_eq!(err.to_string(), "Insufficient stock for Rice. Available: 2");
    }

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(DomainError::not_found("sale").to_string(), "sale not found");
    }
}
