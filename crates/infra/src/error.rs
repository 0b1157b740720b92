//! Store and service error models.

use thiserror::Error;

use stockroom_core::{DomainError, ProductId, WarehouseId};

/// Failure reported by a store implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique constraint hit (e.g. duplicate product code) or a stale toggle.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A ledger write would have made a balance negative.
    #[error("insufficient stock for product {product_id} in warehouse {warehouse_id}")]
    InsufficientStock {
        product_id: ProductId,
        warehouse_id: WarehouseId,
    },

    /// A ledger write would have pushed a balance past the `i64` range.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// Anything else: connection loss, lock poisoning, undecodable rows.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Error returned by the processor, catalog and report services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(
        "insufficient stock for product {product_id} in warehouse {warehouse_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        warehouse_id: WarehouseId,
        available: i64,
        requested: i64,
    },

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::InvariantViolation(msg) => Self::InvariantViolation(msg),
            DomainError::NotFound(what) => Self::NotFound(what),
            DomainError::Conflict(msg) => Self::Conflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            // Raced past the pre-check; the exact balance is unknown here.
            StoreError::InsufficientStock {
                product_id,
                warehouse_id,
            } => Self::InvariantViolation(format!(
                "insufficient stock for product {product_id} in warehouse {warehouse_id}"
            )),
            StoreError::OutOfRange(msg) => Self::InvariantViolation(msg),
            other => Self::Store(other),
        }
    }
}
