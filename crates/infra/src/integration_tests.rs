//! End-to-end tests over the in-memory stores:
//! catalog → MovementProcessor → ledger/log → reports.
//!
//! Verifies:
//! - The four reference scenarios (entry, exit into low stock, transfer,
//!   rejected over-withdrawal)
//! - The ledger always equals the balances replayed from the movement log

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stockroom_catalog::{NewProduct, NewWarehouse, Product, Warehouse};
    use stockroom_core::{UserId, WarehouseId};
    use stockroom_inventory::{derive_balances, MovementRequest, MovementType};

    use crate::catalog::{CatalogService, InMemoryCatalogStore};
    use crate::error::ServiceError;
    use crate::processor::MovementProcessor;
    use crate::reports::InventoryReports;
    use crate::stock::{InMemoryInventoryStore, MovementLog, StockLedger};

    struct System {
        catalog: CatalogService,
        store: Arc<InMemoryInventoryStore>,
        processor: MovementProcessor,
        reports: InventoryReports,
        user: UserId,
    }

    fn system() -> System {
        let catalog_store = Arc::new(InMemoryCatalogStore::new());
        let store = Arc::new(InMemoryInventoryStore::new());
        System {
            catalog: CatalogService::new(catalog_store.clone()),
            processor: MovementProcessor::new(catalog_store.clone(), store.clone()),
            reports: InventoryReports::new(catalog_store, store.clone()),
            store,
            user: UserId::new(),
        }
    }

    impl System {
        async fn warehouse(&self, name: &str) -> Warehouse {
            self.catalog
                .create_warehouse(NewWarehouse {
                    name: name.into(),
                    ..Default::default()
                })
                .await
                .unwrap()
        }

        async fn move_stock(
            &self,
            product: &Product,
            movement_type: MovementType,
            quantity: i64,
            source: Option<&Warehouse>,
            destination: Option<&Warehouse>,
        ) -> Result<(), ServiceError> {
            self.processor
                .record(
                    MovementRequest {
                        product_id: product.id,
                        movement_type,
                        quantity,
                        source_warehouse_id: source.map(|w| w.id),
                        destination_warehouse_id: destination.map(|w| w.id),
                        unit_price: None,
                        reason: None,
                    },
                    self.user,
                )
                .await
                .map(|_| ())
        }

        async fn balance(&self, product: &Product, warehouse: &Warehouse) -> i64 {
            self.store.get_balance(product.id, warehouse.id).await.unwrap()
        }

        async fn assert_ledger_matches_log(&self) {
            let log = self.store.recent(1000).await.unwrap();
            let replayed = derive_balances(&log).unwrap();
            for entry in self.store.all_entries().await.unwrap() {
                let expected = replayed
                    .get(&(entry.product_id, entry.warehouse_id))
                    .copied()
                    .unwrap_or(0);
                assert_eq!(entry.current_stock, expected);
            }
        }
    }

    #[tokio::test]
    async fn reference_scenarios_end_to_end() {
        let sys = system();
        let p = sys
            .catalog
            .create_product(NewProduct {
                code: "P".into(),
                name: "Pump".into(),
                min_stock: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();
        let w = sys.warehouse("W").await;

        // 1. entry of 20: not low.
        sys.move_stock(&p, MovementType::Entry, 20, None, Some(&w))
            .await
            .unwrap();
        assert_eq!(sys.balance(&p, &w).await, 20);
        assert!(sys.reports.low_stock().await.unwrap().is_empty());

        // 2. exit of 18: low at 2.
        sys.move_stock(&p, MovementType::Exit, 18, Some(&w), None)
            .await
            .unwrap();
        assert_eq!(sys.balance(&p, &w).await, 2);
        let low = sys.reports.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(
            (low[0].product.id, low[0].warehouse.id, low[0].current_stock, low[0].min_stock),
            (p.id, w.id, 2, 5)
        );

        // 3. transfer everything to W2.
        let w2 = sys.warehouse("W2").await;
        sys.move_stock(&p, MovementType::Transfer, 2, Some(&w), Some(&w2))
            .await
            .unwrap();
        assert_eq!(sys.balance(&p, &w).await, 0);
        assert_eq!(sys.balance(&p, &w2).await, 2);
        assert_eq!(sys.store.sum_balances(p.id, None).await.unwrap(), 2);

        // 4. over-withdrawal is rejected; nothing changes.
        let before = sys.store.recent(100).await.unwrap().len();
        let err = sys
            .move_stock(&p, MovementType::Exit, 999, Some(&w), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InsufficientStock {
                available: 0,
                requested: 999,
                ..
            }
        ));
        assert_eq!(sys.balance(&p, &w).await, 0);
        assert_eq!(sys.store.recent(100).await.unwrap().len(), before);

        sys.assert_ledger_matches_log().await;
    }

    #[tokio::test]
    async fn inactive_masters_still_accept_movements() {
        let sys = system();
        let p = sys
            .catalog
            .create_product(NewProduct {
                code: "OLD".into(),
                name: "Legacy part".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let w = sys.warehouse("Archive").await;
        sys.catalog.deactivate_warehouse(w.id).await.unwrap();
        sys.catalog
            .deactivate_product(p.id, sys.user, None)
            .await
            .unwrap();

        sys.move_stock(&p, MovementType::Entry, 4, None, Some(&w))
            .await
            .unwrap();
        assert_eq!(sys.balance(&p, &w).await, 4);

        // Hidden from low stock because the product is inactive.
        assert!(sys.reports.low_stock().await.unwrap().is_empty());
        let view = sys.reports.product_with_inventory(p.id).await.unwrap();
        assert_eq!(view.inventory.len(), 1);
        assert_eq!(view.inventory[0].current_stock, 4);
    }

    #[tokio::test]
    async fn mixed_history_keeps_ledger_equal_to_replayed_log() {
        let sys = system();
        let p = sys
            .catalog
            .create_product(NewProduct {
                code: "MIX".into(),
                name: "Mixed".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let ws: Vec<Warehouse> = {
            let mut ws = Vec::new();
            for name in ["A", "B", "C"] {
                ws.push(sys.warehouse(name).await);
            }
            ws
        };

        let script: [(MovementType, i64, Option<usize>, Option<usize>); 8] = [
            (MovementType::Entry, 10, None, Some(0)),
            (MovementType::Transfer, 4, Some(0), Some(1)),
            (MovementType::Exit, 7, Some(0), None),
            (MovementType::Adjustment, 3, None, Some(2)),
            (MovementType::Transfer, 5, Some(1), Some(2)),
            (MovementType::Adjustment, 1, Some(2), None),
            (MovementType::Exit, 2, Some(2), None),
            (MovementType::Transfer, 9, Some(2), Some(0)),
        ];
        for (movement_type, qty, src, dst) in script {
            // Rejections are part of the script; they must not leave a trace.
            let _ = sys
                .move_stock(
                    &p,
                    movement_type,
                    qty,
                    src.map(|i| &ws[i]),
                    dst.map(|i| &ws[i]),
                )
                .await;
        }

        sys.assert_ledger_matches_log().await;
        let total = sys.store.sum_balances(p.id, None).await.unwrap();
        assert!(total >= 0);
        let ids: Vec<WarehouseId> = ws.iter().map(|w| w.id).collect();
        assert_eq!(sys.store.sum_balances(p.id, Some(&ids)).await.unwrap(), total);
    }
}
