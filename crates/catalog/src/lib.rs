//! Catalog master data: products, categories, suppliers and warehouses.
//!
//! Plain data types plus their validation rules (no IO, no HTTP, no storage).
//! Every master is soft-deleted through an `is_active` flag.

pub mod audit;
pub mod master;
pub mod product;

pub use audit::{DeactivationAction, ProductDeactivation};
pub use master::{
    Category, CategoryPatch, NewCategory, NewSupplier, NewWarehouse, Supplier, SupplierPatch,
    Warehouse, WarehousePatch,
};
pub use product::{NewProduct, Product, ProductPatch, DEFAULT_UNIT};

use stockroom_core::{DomainError, DomainResult};

/// Trim a required text field, rejecting blank input.
pub(crate) fn required_text(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; blank input becomes `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
