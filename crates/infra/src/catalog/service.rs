//! Catalog use cases: validated create/update/deactivate for every master.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use stockroom_catalog::{
    Category, CategoryPatch, DeactivationAction, NewCategory, NewProduct, NewSupplier,
    NewWarehouse, Product, ProductDeactivation, ProductPatch, Supplier, SupplierPatch, Warehouse,
    WarehousePatch,
};
use stockroom_core::{
    CategoryId, Page, Pagination, ProductId, SupplierId, UserId, WarehouseId,
};

use super::CatalogStore;
use crate::error::ServiceError;

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    // Categories

    pub async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        Ok(self.store.list_categories().await?)
    }

    #[instrument(skip(self, input), err)]
    pub async fn create_category(&self, input: NewCategory) -> Result<Category, ServiceError> {
        let category = input.validate(CategoryId::new(), Utc::now())?;
        self.store.insert_category(&category).await?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    #[instrument(skip(self, patch), fields(category_id = %id), err)]
    pub async fn update_category(
        &self,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> Result<Category, ServiceError> {
        let mut category = self.require_category(id).await?;
        patch.apply_to(&mut category)?;
        self.store.update_category(&category).await?;
        Ok(category)
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    pub async fn deactivate_category(&self, id: CategoryId) -> Result<Category, ServiceError> {
        let mut category = self.require_category(id).await?;
        category.is_active = false;
        self.store.update_category(&category).await?;
        info!(category_id = %id, "category deactivated");
        Ok(category)
    }

    async fn require_category(&self, id: CategoryId) -> Result<Category, ServiceError> {
        self.store
            .get_category(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("category {id}")))
    }

    // Suppliers

    pub async fn list_suppliers(&self) -> Result<Vec<Supplier>, ServiceError> {
        Ok(self.store.list_suppliers().await?)
    }

    #[instrument(skip(self, input), err)]
    pub async fn create_supplier(&self, input: NewSupplier) -> Result<Supplier, ServiceError> {
        let supplier = input.validate(SupplierId::new(), Utc::now())?;
        self.store.insert_supplier(&supplier).await?;
        info!(supplier_id = %supplier.id, "supplier created");
        Ok(supplier)
    }

    #[instrument(skip(self, patch), fields(supplier_id = %id), err)]
    pub async fn update_supplier(
        &self,
        id: SupplierId,
        patch: SupplierPatch,
    ) -> Result<Supplier, ServiceError> {
        let mut supplier = self.require_supplier(id).await?;
        patch.apply_to(&mut supplier)?;
        self.store.update_supplier(&supplier).await?;
        Ok(supplier)
    }

    #[instrument(skip(self), fields(supplier_id = %id), err)]
    pub async fn deactivate_supplier(&self, id: SupplierId) -> Result<Supplier, ServiceError> {
        let mut supplier = self.require_supplier(id).await?;
        supplier.is_active = false;
        self.store.update_supplier(&supplier).await?;
        info!(supplier_id = %id, "supplier deactivated");
        Ok(supplier)
    }

    async fn require_supplier(&self, id: SupplierId) -> Result<Supplier, ServiceError> {
        self.store
            .get_supplier(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("supplier {id}")))
    }

    // Warehouses

    pub async fn list_warehouses(&self) -> Result<Vec<Warehouse>, ServiceError> {
        Ok(self.store.list_warehouses().await?)
    }

    #[instrument(skip(self, input), err)]
    pub async fn create_warehouse(&self, input: NewWarehouse) -> Result<Warehouse, ServiceError> {
        let warehouse = input.validate(WarehouseId::new(), Utc::now())?;
        self.store.insert_warehouse(&warehouse).await?;
        info!(warehouse_id = %warehouse.id, "warehouse created");
        Ok(warehouse)
    }

    #[instrument(skip(self, patch), fields(warehouse_id = %id), err)]
    pub async fn update_warehouse(
        &self,
        id: WarehouseId,
        patch: WarehousePatch,
    ) -> Result<Warehouse, ServiceError> {
        let mut warehouse = self.require_warehouse(id).await?;
        patch.apply_to(&mut warehouse)?;
        self.store.update_warehouse(&warehouse).await?;
        Ok(warehouse)
    }

    #[instrument(skip(self), fields(warehouse_id = %id), err)]
    pub async fn deactivate_warehouse(&self, id: WarehouseId) -> Result<Warehouse, ServiceError> {
        let mut warehouse = self.require_warehouse(id).await?;
        warehouse.is_active = false;
        self.store.update_warehouse(&warehouse).await?;
        info!(warehouse_id = %id, "warehouse deactivated");
        Ok(warehouse)
    }

    async fn require_warehouse(&self, id: WarehouseId) -> Result<Warehouse, ServiceError> {
        self.store
            .get_warehouse(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("warehouse {id}")))
    }

    // Products

    pub async fn get_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {id}")))
    }

    #[instrument(skip(self, input), fields(code = %input.code), err)]
    pub async fn create_product(&self, input: NewProduct) -> Result<Product, ServiceError> {
        let product = input.validate(ProductId::new(), Utc::now())?;
        self.check_references(&product).await?;
        self.store.insert_product(&product).await?;
        info!(product_id = %product.id, code = %product.code, "product created");
        Ok(product)
    }

    #[instrument(skip(self, patch), fields(product_id = %id), err)]
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, ServiceError> {
        let current = self.get_product(id).await?;
        let next = patch.applied_to(&current, Utc::now())?;
        self.check_references(&next).await?;
        self.store.update_product(&next).await?;
        Ok(next)
    }

    pub async fn deactivate_product(
        &self,
        id: ProductId,
        user_id: UserId,
        reason: Option<String>,
    ) -> Result<(Product, ProductDeactivation), ServiceError> {
        self.toggle_product(id, DeactivationAction::Deactivate, user_id, reason)
            .await
    }

    pub async fn reactivate_product(
        &self,
        id: ProductId,
        user_id: UserId,
        reason: Option<String>,
    ) -> Result<(Product, ProductDeactivation), ServiceError> {
        self.toggle_product(id, DeactivationAction::Reactivate, user_id, reason)
            .await
    }

    #[instrument(skip(self, reason), fields(product_id = %id, action = action.as_str()), err)]
    async fn toggle_product(
        &self,
        id: ProductId,
        action: DeactivationAction,
        user_id: UserId,
        reason: Option<String>,
    ) -> Result<(Product, ProductDeactivation), ServiceError> {
        let current = self.get_product(id).await?;
        let audit = ProductDeactivation::for_product(&current, action, user_id, reason, Utc::now())?;
        let product = self.store.set_product_active(&audit).await?;
        info!(product_id = %id, action = action.as_str(), user_id = %user_id, "product toggled");
        Ok((product, audit))
    }

    pub async fn product_audit(
        &self,
        id: ProductId,
        pagination: Pagination,
    ) -> Result<Page<ProductDeactivation>, ServiceError> {
        self.get_product(id).await?;
        Ok(self.store.product_audit(id, pagination).await?)
    }

    async fn check_references(&self, product: &Product) -> Result<(), ServiceError> {
        if let Some(category_id) = product.category_id {
            self.require_category(category_id).await?;
        }
        if let Some(supplier_id) = product.supplier_id {
            self.require_supplier(supplier_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalogStore, ProductFilter};

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(InMemoryCatalogStore::new()))
    }

    fn new_product(code: &str) -> NewProduct {
        NewProduct {
            code: code.to_string(),
            name: format!("Product {code}"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn product_with_unknown_category_is_not_found() {
        let svc = service();
        let input = NewProduct {
            category_id: Some(CategoryId::new()),
            ..new_product("X-1")
        };
        let err = svc.create_product(input).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_code_is_a_conflict() {
        let svc = service();
        svc.create_product(new_product("DUP")).await.unwrap();
        let err = svc.create_product(new_product("DUP")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_rejects_max_below_min() {
        let svc = service();
        let product = svc.create_product(new_product("P")).await.unwrap();
        let patch = ProductPatch {
            min_stock: Some(10),
            max_stock: Some(5),
            ..Default::default()
        };
        let err = svc.update_product(product.id, patch).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(svc.get_product(product.id).await.unwrap().min_stock, 0);
    }

    #[tokio::test]
    async fn deactivate_then_reactivate_writes_two_audit_rows() {
        let svc = service();
        let product = svc.create_product(new_product("P")).await.unwrap();
        let user = UserId::new();

        let (inactive, _) = svc
            .deactivate_product(product.id, user, Some("seasonal".into()))
            .await
            .unwrap();
        assert!(!inactive.is_active);
        assert!(matches!(
            svc.deactivate_product(product.id, user, None).await,
            Err(ServiceError::Conflict(_))
        ));

        let (active, _) = svc.reactivate_product(product.id, user, None).await.unwrap();
        assert!(active.is_active);

        let trail = svc.product_audit(product.id, Pagination::default()).await.unwrap();
        assert_eq!(trail.total, 2);
        assert_eq!(trail.items[0].action, DeactivationAction::Reactivate);
        assert_eq!(trail.items[1].reason.as_deref(), Some("seasonal"));
    }

    #[tokio::test]
    async fn deactivated_warehouse_drops_out_of_list() {
        let svc = service();
        let warehouse = svc
            .create_warehouse(NewWarehouse {
                name: "North".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        svc.deactivate_warehouse(warehouse.id).await.unwrap();
        assert!(svc.list_warehouses().await.unwrap().is_empty());
        assert!(svc
            .store()
            .search_products(&ProductFilter::default())
            .await
            .unwrap()
            .is_empty());
    }
}
