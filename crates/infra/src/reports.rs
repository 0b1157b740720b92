//! Read-only aggregation queries over the ledger, the movement log and the
//! catalog. Nothing here writes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use stockroom_catalog::{Category, Product, Supplier, Warehouse};
use stockroom_core::{Page, Pagination, ProductId, WarehouseId};
use stockroom_inventory::{
    is_low_stock, summarize_days, DailyMovementSummary, DayWindow, LedgerEntry, Movement,
    MovementTypeCounts, SUMMARY_DAYS,
};

use crate::catalog::{CatalogStore, ProductFilter};
use crate::error::ServiceError;
use crate::stock::{InventoryStore, MovementFilter};

/// Default size of the dashboard's recent movement feed.
pub const DEFAULT_RECENT_LIMIT: u32 = 10;

/// One ledger row at or below its product's minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockItem {
    pub product: Product,
    pub warehouse: Warehouse,
    pub current_stock: i64,
    pub min_stock: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_products: u64,
    pub low_stock_items: u64,
    pub active_warehouses: u64,
    pub today_movements: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStock {
    pub warehouse: Warehouse,
    pub current_stock: i64,
}

/// A product joined with its masters and per-warehouse balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWithInventory {
    pub product: Product,
    pub category: Option<Category>,
    pub supplier: Option<Supplier>,
    pub inventory: Vec<WarehouseStock>,
    pub total_stock: i64,
    pub is_low_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListing {
    #[serde(flatten)]
    pub product: Product,
    pub total_stock: i64,
    pub is_low_stock: bool,
}

/// A ledger row with the names a person needs to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: ProductId,
    pub product_code: String,
    pub product_name: String,
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    pub current_stock: i64,
    pub min_stock: i64,
    pub is_low_stock: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDetails {
    #[serde(flatten)]
    pub movement: Movement,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub source_warehouse_name: Option<String>,
    pub destination_warehouse_name: Option<String>,
}

#[derive(Clone)]
pub struct InventoryReports {
    catalog: Arc<dyn CatalogStore>,
    store: Arc<dyn InventoryStore>,
}

impl InventoryReports {
    pub fn new(catalog: Arc<dyn CatalogStore>, store: Arc<dyn InventoryStore>) -> Self {
        Self { catalog, store }
    }

    /// Ledger rows of active products with `current_stock <= min_stock`,
    /// most critical first.
    pub async fn low_stock(&self) -> Result<Vec<LowStockItem>, ServiceError> {
        let entries = self.store.all_entries().await?;
        let (products, warehouses) = self.masters_for(&entries).await?;

        let mut items: Vec<LowStockItem> = entries
            .into_iter()
            .filter_map(|e| {
                let product = products.get(&e.product_id)?;
                let warehouse = warehouses.get(&e.warehouse_id)?;
                (product.is_active && is_low_stock(e.current_stock, product.min_stock)).then(|| {
                    LowStockItem {
                        product: product.clone(),
                        warehouse: warehouse.clone(),
                        current_stock: e.current_stock,
                        min_stock: product.min_stock,
                    }
                })
            })
            .collect();

        items.sort_by(|a, b| {
            a.current_stock
                .cmp(&b.current_stock)
                .then_with(|| a.product.name.cmp(&b.product.name))
                .then_with(|| a.warehouse.name.cmp(&b.warehouse.name))
        });
        Ok(items)
    }

    pub async fn dashboard_stats(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<DashboardStats, ServiceError> {
        let total_products = self
            .catalog
            .search_products(&ProductFilter::default())
            .await?
            .len() as u64;
        let low_stock_items = self.low_stock().await?.len() as u64;
        let active_warehouses = self.catalog.list_warehouses().await?.len() as u64;
        let today_movements = self.today_counts(now).await?.total;

        Ok(DashboardStats {
            total_products,
            low_stock_items,
            active_warehouses,
            today_movements,
        })
    }

    /// Per-type counts of movements created during `now`'s calendar day.
    pub async fn today_counts(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<MovementTypeCounts, ServiceError> {
        let today = DayWindow::today(now);
        Ok(self
            .store
            .count_by_type_between(today.start, today.end)
            .await?)
    }

    /// Daily quantities for the last seven days, today included, oldest first.
    pub async fn product_movement_summary(
        &self,
        product_id: ProductId,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<DailyMovementSummary>, ServiceError> {
        self.require_product(product_id).await?;

        let windows = DayWindow::trailing(now, SUMMARY_DAYS);
        let (Some(first), Some(last)) = (windows.first(), windows.last()) else {
            return Ok(Vec::new());
        };
        let movements = self
            .store
            .created_between(first.start, last.end, Some(product_id))
            .await?;
        Ok(summarize_days(&movements, now, SUMMARY_DAYS))
    }

    pub async fn product_with_inventory(
        &self,
        product_id: ProductId,
    ) -> Result<ProductWithInventory, ServiceError> {
        let product = self.require_product(product_id).await?;
        let category = match product.category_id {
            Some(id) => self.catalog.get_category(id).await?,
            None => None,
        };
        let supplier = match product.supplier_id {
            Some(id) => self.catalog.get_supplier(id).await?,
            None => None,
        };

        let entries = self.store.entries_for_product(product_id).await?;
        let stocked: Vec<WarehouseId> = entries.iter().map(|e| e.warehouse_id).collect();
        let mut warehouses: HashMap<WarehouseId, Warehouse> = self
            .catalog
            .list_warehouses()
            .await?
            .into_iter()
            .map(|w| (w.id, w))
            .collect();
        // Inactive warehouses still count when they hold stock.
        for w in self.catalog.warehouses_by_ids(&stocked).await? {
            warehouses.entry(w.id).or_insert(w);
        }

        let balances: HashMap<WarehouseId, i64> = entries
            .iter()
            .map(|e| (e.warehouse_id, e.current_stock))
            .collect();
        let mut inventory: Vec<WarehouseStock> = warehouses
            .into_values()
            .map(|warehouse| WarehouseStock {
                current_stock: balances.get(&warehouse.id).copied().unwrap_or(0),
                warehouse,
            })
            .collect();
        inventory.sort_by(|a, b| a.warehouse.name.cmp(&b.warehouse.name));

        let total_stock = entries
            .iter()
            .fold(0i64, |acc, e| acc.saturating_add(e.current_stock));
        Ok(ProductWithInventory {
            is_low_stock: is_low_stock(total_stock, product.min_stock),
            product,
            category,
            supplier,
            inventory,
            total_stock,
        })
    }

    pub async fn list_products(
        &self,
        filter: ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<ProductListing>, ServiceError> {
        let products = self.catalog.search_products(&filter).await?;
        let totals = self.store.totals_by_product().await?;

        let listings: Vec<ProductListing> = products
            .into_iter()
            .map(|product| {
                let total_stock = totals.get(&product.id).copied().unwrap_or(0);
                ProductListing {
                    is_low_stock: is_low_stock(total_stock, product.min_stock),
                    product,
                    total_stock,
                }
            })
            .filter(|l| !filter.low_stock_only || l.is_low_stock)
            .collect();

        Ok(pagination.apply(listings))
    }

    pub async fn inventory_by_warehouse(
        &self,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<StockLine>, ServiceError> {
        if self.catalog.get_warehouse(warehouse_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("warehouse {warehouse_id}")));
        }
        let entries = self.store.entries_for_warehouse(warehouse_id).await?;
        let mut lines = self.stock_lines(entries).await?;
        lines.sort_by(|a, b| a.product_name.cmp(&b.product_name));
        Ok(lines)
    }

    pub async fn inventory_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockLine>, ServiceError> {
        self.require_product(product_id).await?;
        let entries = self.store.entries_for_product(product_id).await?;
        let mut lines = self.stock_lines(entries).await?;
        lines.sort_by(|a, b| a.warehouse_name.cmp(&b.warehouse_name));
        Ok(lines)
    }

    pub async fn list_movements(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<MovementDetails>, ServiceError> {
        let page = self.store.query(filter, pagination).await?;
        let details = self.movement_details(page.items).await?;
        Ok(Page::new(details, page.total, page.pagination))
    }

    pub async fn recent_movements(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<MovementDetails>, ServiceError> {
        let movements = self
            .store
            .recent(limit.unwrap_or(DEFAULT_RECENT_LIMIT))
            .await?;
        self.movement_details(movements).await
    }

    /// Full history of one product, newest first.
    pub async fn product_movements(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<MovementDetails>, ServiceError> {
        self.require_product(product_id).await?;
        let movements = self.store.query_by_product(product_id).await?;
        self.movement_details(movements).await
    }

    async fn require_product(&self, product_id: ProductId) -> Result<Product, ServiceError> {
        self.catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {product_id}")))
    }

    async fn masters_for(
        &self,
        entries: &[LedgerEntry],
    ) -> Result<(HashMap<ProductId, Product>, HashMap<WarehouseId, Warehouse>), ServiceError> {
        let product_ids: Vec<ProductId> = distinct(entries.iter().map(|e| e.product_id));
        let warehouse_ids: Vec<WarehouseId> = distinct(entries.iter().map(|e| e.warehouse_id));
        self.masters_by_ids(&product_ids, &warehouse_ids).await
    }

    async fn masters_by_ids(
        &self,
        product_ids: &[ProductId],
        warehouse_ids: &[WarehouseId],
    ) -> Result<(HashMap<ProductId, Product>, HashMap<WarehouseId, Warehouse>), ServiceError> {
        let products = self
            .catalog
            .products_by_ids(product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let warehouses = self
            .catalog
            .warehouses_by_ids(warehouse_ids)
            .await?
            .into_iter()
            .map(|w| (w.id, w))
            .collect();
        Ok((products, warehouses))
    }

    async fn stock_lines(&self, entries: Vec<LedgerEntry>) -> Result<Vec<StockLine>, ServiceError> {
        let (products, warehouses) = self.masters_for(&entries).await?;
        Ok(entries
            .into_iter()
            .filter_map(|e| {
                let product = products.get(&e.product_id)?;
                let warehouse = warehouses.get(&e.warehouse_id)?;
                Some(StockLine {
                    product_id: e.product_id,
                    product_code: product.code.clone(),
                    product_name: product.name.clone(),
                    warehouse_id: e.warehouse_id,
                    warehouse_name: warehouse.name.clone(),
                    current_stock: e.current_stock,
                    min_stock: product.min_stock,
                    is_low_stock: is_low_stock(e.current_stock, product.min_stock),
                    updated_at: e.updated_at,
                })
            })
            .collect())
    }

    async fn movement_details(
        &self,
        movements: Vec<Movement>,
    ) -> Result<Vec<MovementDetails>, ServiceError> {
        let product_ids = distinct(movements.iter().map(|m| m.product_id));
        let warehouse_ids = distinct(
            movements
                .iter()
                .flat_map(|m| [m.source_warehouse_id, m.destination_warehouse_id])
                .flatten(),
        );
        let (products, warehouses) = self.masters_by_ids(&product_ids, &warehouse_ids).await?;

        let name_of = |id: Option<WarehouseId>| {
            id.and_then(|w| warehouses.get(&w)).map(|w| w.name.clone())
        };
        Ok(movements
            .into_iter()
            .map(|movement| {
                let product = products.get(&movement.product_id);
                MovementDetails {
                    product_code: product.map(|p| p.code.clone()),
                    product_name: product.map(|p| p.name.clone()),
                    source_warehouse_name: name_of(movement.source_warehouse_id),
                    destination_warehouse_name: name_of(movement.destination_warehouse_id),
                    movement,
                }
            })
            .collect())
    }
}

fn distinct<T: Copy + Eq + std::hash::Hash>(ids: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stockroom_catalog::{NewProduct, NewWarehouse};
    use stockroom_core::UserId;
    use stockroom_inventory::{LedgerDelta, MovementRequest, MovementType};

    use crate::catalog::InMemoryCatalogStore;
    use crate::processor::MovementProcessor;
    use crate::stock::{InMemoryInventoryStore, InventoryTransaction};

    struct Fixture {
        catalog: Arc<InMemoryCatalogStore>,
        store: Arc<InMemoryInventoryStore>,
        processor: MovementProcessor,
        reports: InventoryReports,
        user: UserId,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let store = Arc::new(InMemoryInventoryStore::new());
        Fixture {
            processor: MovementProcessor::new(catalog.clone(), store.clone()),
            reports: InventoryReports::new(catalog.clone(), store.clone()),
            store,
            catalog,
            user: UserId::new(),
        }
    }

    impl Fixture {
        async fn product(&self, code: &str, min_stock: i64) -> Product {
            let product = NewProduct {
                code: code.into(),
                name: format!("Product {code}"),
                min_stock: Some(min_stock),
                ..Default::default()
            }
            .validate(ProductId::new(), Utc::now())
            .unwrap();
            self.catalog.insert_product(&product).await.unwrap();
            product
        }

        async fn warehouse(&self, name: &str) -> Warehouse {
            let warehouse = NewWarehouse {
                name: name.into(),
                ..Default::default()
            }
            .validate(WarehouseId::new(), Utc::now())
            .unwrap();
            self.catalog.insert_warehouse(&warehouse).await.unwrap();
            warehouse
        }

        /// Write a balance straight into the ledger, bypassing movement validation.
        async fn seed_balance(&self, product: &Product, warehouse: &Warehouse, amount: i64) {
            let mut tx = self.store.begin().await.unwrap();
            tx.apply_delta(LedgerDelta::new(product.id, warehouse.id, amount))
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        async fn entry(&self, product: &Product, warehouse: &Warehouse, quantity: i64) {
            self.record(MovementRequest {
                product_id: product.id,
                movement_type: MovementType::Entry,
                quantity,
                source_warehouse_id: None,
                destination_warehouse_id: Some(warehouse.id),
                unit_price: None,
                reason: None,
            })
            .await;
        }

        async fn record(&self, request: MovementRequest) {
            self.processor.record(request, self.user).await.unwrap();
        }
    }

    #[tokio::test]
    async fn low_stock_boundary_is_inclusive() {
        let f = fixture();
        let w = f.warehouse("Main").await;
        let at_min = f.product("AT", 10).await;
        let above_min = f.product("ABOVE", 10).await;
        f.entry(&at_min, &w, 10).await;
        f.entry(&above_min, &w, 11).await;

        let low = f.reports.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product.id, at_min.id);
        assert_eq!(low[0].current_stock, 10);
        assert_eq!(low[0].min_stock, 10);
    }

    #[tokio::test]
    async fn low_stock_is_ordered_most_critical_first_and_skips_inactive() {
        let f = fixture();
        let w = f.warehouse("Main").await;
        let a = f.product("A", 50).await;
        let b = f.product("B", 50).await;
        let mut gone = f.product("GONE", 50).await;
        f.entry(&a, &w, 30).await;
        f.entry(&b, &w, 4).await;
        f.entry(&gone, &w, 1).await;
        gone.is_active = false;
        f.catalog.update_product(&gone).await.unwrap();

        let codes: Vec<String> = f
            .reports
            .low_stock()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.product.code)
            .collect();
        assert_eq!(codes, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn dashboard_counts_today() {
        let f = fixture();
        let w = f.warehouse("Main").await;
        let p = f.product("P", 5).await;
        f.entry(&p, &w, 20).await;
        f.record(MovementRequest {
            product_id: p.id,
            movement_type: MovementType::Exit,
            quantity: 18,
            source_warehouse_id: Some(w.id),
            destination_warehouse_id: None,
            unit_price: None,
            reason: None,
        })
        .await;

        let now = Utc::now().fixed_offset();
        let stats = f.reports.dashboard_stats(now).await.unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                total_products: 1,
                low_stock_items: 1,
                active_warehouses: 1,
                today_movements: 2,
            }
        );

        let counts = f.reports.today_counts(now).await.unwrap();
        assert_eq!((counts.entry, counts.exit, counts.total), (1, 1, 2));

        let tomorrow = now + Duration::days(1);
        assert_eq!(f.reports.today_counts(tomorrow).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn repeated_reads_are_identical() {
        let f = fixture();
        let w = f.warehouse("Main").await;
        let p = f.product("P", 5).await;
        f.entry(&p, &w, 3).await;
        let now = Utc::now().fixed_offset();

        assert_eq!(f.reports.low_stock().await.unwrap(), f.reports.low_stock().await.unwrap());
        assert_eq!(
            f.reports.dashboard_stats(now).await.unwrap(),
            f.reports.dashboard_stats(now).await.unwrap()
        );
        assert_eq!(
            f.reports.product_movement_summary(p.id, now).await.unwrap(),
            f.reports.product_movement_summary(p.id, now).await.unwrap()
        );
    }

    #[tokio::test]
    async fn movement_summary_covers_seven_days_ending_today() {
        let f = fixture();
        let w = f.warehouse("Main").await;
        let p = f.product("P", 0).await;
        f.entry(&p, &w, 7).await;
        f.record(MovementRequest {
            product_id: p.id,
            movement_type: MovementType::Adjustment,
            quantity: 2,
            source_warehouse_id: Some(w.id),
            destination_warehouse_id: None,
            unit_price: None,
            reason: Some("cycle count".into()),
        })
        .await;

        let now = Utc::now().fixed_offset();
        let days = f.reports.product_movement_summary(p.id, now).await.unwrap();
        assert_eq!(days.len(), 7);
        assert_eq!(days[6].date, now.date_naive());
        assert_eq!((days[6].entries, days[6].adjustments), (7, 2));
        assert!(days[..6].iter().all(|d| d.entries == 0 && d.adjustments == 0));
    }

    #[tokio::test]
    async fn product_view_zero_fills_active_warehouses() {
        let f = fixture();
        let stocked = f.warehouse("Alpha").await;
        let empty = f.warehouse("Beta").await;
        let p = f.product("P", 5).await;
        f.entry(&p, &stocked, 8).await;

        let view = f.reports.product_with_inventory(p.id).await.unwrap();
        assert_eq!(view.total_stock, 8);
        assert!(!view.is_low_stock);
        let rows: Vec<(WarehouseId, i64)> = view
            .inventory
            .iter()
            .map(|s| (s.warehouse.id, s.current_stock))
            .collect();
        assert_eq!(rows, vec![(stocked.id, 8), (empty.id, 0)]);
    }

    #[tokio::test]
    async fn stock_totals_saturate_instead_of_overflowing() {
        let f = fixture();
        let p = f.product("HUGE", 0).await;
        let a = f.warehouse("A").await;
        let b = f.warehouse("B").await;
        f.seed_balance(&p, &a, i64::MAX).await;
        f.seed_balance(&p, &b, i64::MAX).await;

        let view = f.reports.product_with_inventory(p.id).await.unwrap();
        assert_eq!(view.total_stock, i64::MAX);
        assert!(!view.is_low_stock);

        let page = f
            .reports
            .list_products(ProductFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.items[0].total_stock, i64::MAX);
    }

    #[tokio::test]
    async fn product_list_can_be_limited_to_low_stock() {
        let f = fixture();
        let w = f.warehouse("Main").await;
        let low = f.product("LOW", 10).await;
        let fine = f.product("FINE", 1).await;
        f.entry(&low, &w, 2).await;
        f.entry(&fine, &w, 2).await;

        let all = f
            .reports
            .list_products(ProductFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);

        let only_low = f
            .reports
            .list_products(
                ProductFilter {
                    low_stock_only: true,
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(only_low.total, 1);
        assert_eq!(only_low.items[0].product.id, low.id);
        assert_eq!(only_low.items[0].total_stock, 2);
    }

    #[tokio::test]
    async fn movement_listing_carries_names() {
        let f = fixture();
        let a = f.warehouse("Alpha").await;
        let b = f.warehouse("Beta").await;
        let p = f.product("P", 0).await;
        f.entry(&p, &a, 5).await;
        f.record(MovementRequest {
            product_id: p.id,
            movement_type: MovementType::Transfer,
            quantity: 5,
            source_warehouse_id: Some(a.id),
            destination_warehouse_id: Some(b.id),
            unit_price: Some(250),
            reason: None,
        })
        .await;

        let recent = f.reports.recent_movements(None).await.unwrap();
        assert_eq!(recent.len(), 2);
        let transfer = &recent[0];
        assert_eq!(transfer.movement.movement_type, MovementType::Transfer);
        assert_eq!(transfer.movement.total_value, Some(1250));
        assert_eq!(transfer.product_code.as_deref(), Some("P"));
        assert_eq!(transfer.source_warehouse_name.as_deref(), Some("Alpha"));
        assert_eq!(transfer.destination_warehouse_name.as_deref(), Some("Beta"));

        let filtered = f
            .reports
            .list_movements(
                MovementFilter {
                    movement_type: Some(MovementType::Entry),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(filtered.total, 1);

        let lines = f.reports.inventory_by_warehouse(b.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].current_stock, 5);
        assert_eq!(lines[0].warehouse_name, "Beta");
    }
}
