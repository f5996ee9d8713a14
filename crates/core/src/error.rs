//! Domain error model.

use thiserror::Error;

use crate::id::ProductId;

/// Result type used across the domain layer.
pub type StockResult<T> = Result<T, StockError>;

/// Discriminated failure surface of the stock core.
///
/// Keep this focused on the failures callers can act on (validation,
/// missing product, business-rule rejection, infrastructure). Optimistic
/// concurrency conflicts are an infrastructure-internal retry signal and
/// never appear here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Malformed movement input (non-positive quantity, unknown direction).
    /// Local, surfaced immediately, never retried.
    #[error("invalid movement: {0}")]
    InvalidMovement(String),

    /// The referenced product does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Business-rule rejection: an OUT movement would drive stock below zero.
    /// Carries the available quantity so the caller can decide.
    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    /// Transient infrastructure failure. Safe to retry with the same input:
    /// nothing was committed on failure.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl StockError {
    pub fn invalid_movement(msg: impl Into<String>) -> Self {
        Self::InvalidMovement(msg.into())
    }

    pub fn product_not_found(product_id: ProductId) -> Self {
        Self::ProductNotFound(product_id)
    }

    pub fn insufficient_stock(available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            available,
            requested,
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::PersistenceFailure(msg.into())
    }
}
