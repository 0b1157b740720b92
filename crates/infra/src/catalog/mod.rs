//! Master data storage: categories, suppliers, warehouses and products.
//!
//! Stores return every row they are asked for; "active only" and name
//! ordering are applied by the list methods, not by callers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stockroom_catalog::{Category, Product, ProductDeactivation, Supplier, Warehouse};
use stockroom_core::{CategoryId, Page, Pagination, ProductId, SupplierId, WarehouseId};

use crate::error::StoreError;

pub mod in_memory;
pub mod postgres;
pub mod service;

pub use in_memory::InMemoryCatalogStore;
pub use postgres::PostgresCatalogStore;
pub use service::CatalogService;

/// Product list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Case-insensitive substring of the name or code.
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    pub supplier_id: Option<SupplierId>,
    /// Applied by the report layer, which owns the ledger totals.
    #[serde(default)]
    pub low_stock_only: bool,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        let search_hit = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                product.name.to_lowercase().contains(&needle)
                    || product.code.to_lowercase().contains(&needle)
            }
        };
        search_hit
            && self.category_id.is_none_or(|c| product.category_id == Some(c))
            && self.supplier_id.is_none_or(|s| product.supplier_id == Some(s))
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Active categories, sorted by name.
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;
    async fn update_category(&self, category: &Category) -> Result<(), StoreError>;

    /// Active suppliers, sorted by name.
    async fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError>;
    async fn get_supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError>;
    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError>;
    async fn update_supplier(&self, supplier: &Supplier) -> Result<(), StoreError>;

    /// Active warehouses, sorted by name.
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, StoreError>;
    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError>;
    /// Warehouses with the given ids, active or not. Unknown ids are skipped.
    async fn warehouses_by_ids(&self, ids: &[WarehouseId]) -> Result<Vec<Warehouse>, StoreError>;
    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError>;
    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
    /// Active products matching `filter` (ignoring `low_stock_only`), sorted by name.
    async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;
    /// Products with the given ids, active or not. Unknown ids are skipped.
    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;
    /// Fails with `Conflict` when the code is taken.
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn update_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Write the toggled `is_active` flag and its audit row together.
    async fn set_product_active(
        &self,
        audit: &ProductDeactivation,
    ) -> Result<Product, StoreError>;

    /// Audit trail of one product, newest first.
    async fn product_audit(
        &self,
        product_id: ProductId,
        pagination: Pagination,
    ) -> Result<Page<ProductDeactivation>, StoreError>;
}
