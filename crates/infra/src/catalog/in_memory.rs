use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use stockroom_catalog::{Category, Product, ProductDeactivation, Supplier, Warehouse};
use stockroom_core::{CategoryId, Page, Pagination, ProductId, SupplierId, WarehouseId};

use super::{CatalogStore, ProductFilter};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct CatalogState {
    categories: HashMap<CategoryId, Category>,
    suppliers: HashMap<SupplierId, Supplier>,
    warehouses: HashMap<WarehouseId, Warehouse>,
    products: HashMap<ProductId, Product>,
    audit: Vec<ProductDeactivation>,
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    inner: RwLock<CatalogState>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CatalogState>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("catalog lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CatalogState>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("catalog lock poisoned".to_string()))
    }
}

fn active_by_name<T: Clone>(
    rows: impl Iterator<Item = T>,
    is_active: impl Fn(&T) -> bool,
    name: impl Fn(&T) -> String,
) -> Vec<T> {
    let mut out: Vec<T> = rows.filter(|r| is_active(r)).collect();
    out.sort_by_key(|r| name(r).to_lowercase());
    out
}

fn insert_new<K, V>(map: &mut HashMap<K, V>, key: K, value: &V, what: &str) -> Result<(), StoreError>
where
    K: std::hash::Hash + Eq + std::fmt::Display + Copy,
    V: Clone,
{
    if map.contains_key(&key) {
        return Err(StoreError::Conflict(format!("{what} {key} already exists")));
    }
    map.insert(key, value.clone());
    Ok(())
}

fn replace<K, V>(map: &mut HashMap<K, V>, key: K, value: &V, what: &str) -> Result<(), StoreError>
where
    K: std::hash::Hash + Eq + std::fmt::Display + Copy,
    V: Clone,
{
    match map.get_mut(&key) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(StoreError::NotFound(format!("{what} {key}"))),
    }
}

fn code_taken(state: &CatalogState, product: &Product) -> bool {
    state
        .products
        .values()
        .any(|p| p.id != product.id && p.code == product.code)
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let state = self.read()?;
        Ok(active_by_name(
            state.categories.values().cloned(),
            |c| c.is_active,
            |c| c.name.clone(),
        ))
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        insert_new(&mut self.write()?.categories, category.id, category, "category")
    }

    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        replace(&mut self.write()?.categories, category.id, category, "category")
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        let state = self.read()?;
        Ok(active_by_name(
            state.suppliers.values().cloned(),
            |s| s.is_active,
            |s| s.name.clone(),
        ))
    }

    async fn get_supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        Ok(self.read()?.suppliers.get(&id).cloned())
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        insert_new(&mut self.write()?.suppliers, supplier.id, supplier, "supplier")
    }

    async fn update_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        replace(&mut self.write()?.suppliers, supplier.id, supplier, "supplier")
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, StoreError> {
        let state = self.read()?;
        Ok(active_by_name(
            state.warehouses.values().cloned(),
            |w| w.is_active,
            |w| w.name.clone(),
        ))
    }

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        Ok(self.read()?.warehouses.get(&id).cloned())
    }

    async fn warehouses_by_ids(&self, ids: &[WarehouseId]) -> Result<Vec<Warehouse>, StoreError> {
        let state = self.read()?;
        Ok(ids.iter().filter_map(|id| state.warehouses.get(id).cloned()).collect())
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError> {
        insert_new(&mut self.write()?.warehouses, warehouse.id, warehouse, "warehouse")
    }

    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError> {
        replace(&mut self.write()?.warehouses, warehouse.id, warehouse, "warehouse")
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let state = self.read()?;
        Ok(active_by_name(
            state.products.values().filter(|p| filter.matches(p)).cloned(),
            |p| p.is_active,
            |p| p.name.clone(),
        ))
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let state = self.read()?;
        Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if code_taken(&state, product) {
            return Err(StoreError::Conflict(format!(
                "product code '{}' already exists",
                product.code
            )));
        }
        insert_new(&mut state.products, product.id, product, "product")
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if code_taken(&state, product) {
            return Err(StoreError::Conflict(format!(
                "product code '{}' already exists",
                product.code
            )));
        }
        replace(&mut state.products, product.id, product, "product")
    }

    async fn set_product_active(
        &self,
        audit: &ProductDeactivation,
    ) -> Result<Product, StoreError> {
        let mut state = self.write()?;
        let target = audit.action.resulting_active_flag();
        let product = state
            .products
            .get_mut(&audit.product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {}", audit.product_id)))?;
        if product.is_active == target {
            return Err(StoreError::Conflict(format!(
                "product {} is already {}",
                product.code,
                if target { "active" } else { "inactive" }
            )));
        }
        product.is_active = target;
        product.updated_at = audit.created_at;
        let updated = product.clone();
        state.audit.push(audit.clone());
        Ok(updated)
    }

    async fn product_audit(
        &self,
        product_id: ProductId,
        pagination: Pagination,
    ) -> Result<Page<ProductDeactivation>, StoreError> {
        let state = self.read()?;
        let mut rows: Vec<ProductDeactivation> = state
            .audit
            .iter()
            .filter(|a| a.product_id == product_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(pagination.apply(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockroom_catalog::{DeactivationAction, NewProduct, NewWarehouse};
    use stockroom_core::UserId;

    fn product(code: &str, name: &str) -> Product {
        NewProduct {
            code: code.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
        .validate(ProductId::new(), Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_product_code_is_a_conflict() {
        let store = InMemoryCatalogStore::new();
        store.insert_product(&product("SKU-1", "First")).await.unwrap();

        let err = store
            .insert_product(&product("SKU-1", "Second"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn renaming_a_code_onto_another_product_is_a_conflict() {
        let store = InMemoryCatalogStore::new();
        let a = product("A", "Alpha");
        let mut b = product("B", "Beta");
        store.insert_product(&a).await.unwrap();
        store.insert_product(&b).await.unwrap();

        b.code = "A".to_string();
        assert!(matches!(
            store.update_product(&b).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn lists_hide_inactive_rows_and_sort_by_name() {
        let store = InMemoryCatalogStore::new();
        for name in ["Zulu", "alpha", "Mike"] {
            let w = NewWarehouse {
                name: name.to_string(),
                ..Default::default()
            }
            .validate(WarehouseId::new(), Utc::now())
            .unwrap();
            store.insert_warehouse(&w).await.unwrap();
        }
        let mut mike = store
            .list_warehouses()
            .await
            .unwrap()
            .into_iter()
            .find(|w| w.name == "Mike")
            .unwrap();
        mike.is_active = false;
        store.update_warehouse(&mike).await.unwrap();

        let names: Vec<String> = store
            .list_warehouses()
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["alpha", "Zulu"]);
    }

    #[tokio::test]
    async fn deactivation_flips_flag_and_records_audit() {
        let store = InMemoryCatalogStore::new();
        let p = product("P", "Pallet");
        store.insert_product(&p).await.unwrap();

        let audit = ProductDeactivation::for_product(
            &p,
            DeactivationAction::Deactivate,
            UserId::new(),
            Some("discontinued".into()),
            Utc::now(),
        )
        .unwrap();
        let updated = store.set_product_active(&audit).await.unwrap();
        assert!(!updated.is_active);

        // Replaying the same toggle must not write a second audit row.
        assert!(matches!(
            store.set_product_active(&audit).await,
            Err(StoreError::Conflict(_))
        ));

        let trail = store.product_audit(p.id, Pagination::default()).await.unwrap();
        assert_eq!(trail.total, 1);
        assert_eq!(trail.items[0].action, DeactivationAction::Deactivate);
        assert!(store.search_products(&ProductFilter::default()).await.unwrap().is_empty());
    }
}
