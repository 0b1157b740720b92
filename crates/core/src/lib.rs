//! `stockroom-core`: shared domain building blocks.
//!
//! Pure domain primitives only (no infrastructure concerns): typed identifiers,
//! the domain error model and pagination.

pub mod error;
pub mod id;
pub mod pagination;

pub use error::{DomainError, DomainResult};
pub use id::{AuditId, CategoryId, MovementId, ProductId, SupplierId, UserId, WarehouseId};
pub use pagination::{Page, Pagination};
