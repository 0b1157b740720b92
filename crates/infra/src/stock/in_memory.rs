use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockroom_core::{Page, Pagination, ProductId, WarehouseId};
use stockroom_inventory::{LedgerDelta, LedgerEntry, Movement, MovementTypeCounts, NewMovement};

use super::{InventoryStore, InventoryTransaction, MovementFilter, MovementLog, StockLedger};
use crate::error::StoreError;

type LedgerKey = (ProductId, WarehouseId);

#[derive(Debug, Default)]
struct InventoryState {
    ledger: HashMap<LedgerKey, LedgerEntry>,
    movements: Vec<Movement>,
}

impl InventoryState {
    fn newest_first(&self, filter: impl Fn(&Movement) -> bool) -> Vec<Movement> {
        let mut out: Vec<Movement> = self.movements.iter().filter(|m| filter(m)).cloned().collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        out
    }

    fn entries(&self, filter: impl Fn(&LedgerEntry) -> bool) -> Vec<LedgerEntry> {
        let mut out: Vec<LedgerEntry> = self.ledger.values().filter(|e| filter(e)).cloned().collect();
        out.sort_by_key(|e| (e.product_id, e.warehouse_id));
        out
    }
}

/// In-memory stock ledger and movement log.
///
/// Intended for tests/dev. A single async mutex guards all state; an open
/// transaction owns the guard, so transactions are fully serialised and
/// readers wait for the in-flight commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<Mutex<InventoryState>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockLedger for InMemoryInventoryStore {
    async fn get_balance(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<i64, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .get(&(product_id, warehouse_id))
            .map(|e| e.current_stock)
            .unwrap_or(0))
    }

    async fn sum_balances(
        &self,
        product_id: ProductId,
        warehouse_ids: Option<&[WarehouseId]>,
    ) -> Result<i64, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .values()
            .filter(|e| e.product_id == product_id)
            .filter(|e| warehouse_ids.is_none_or(|ws| ws.contains(&e.warehouse_id)))
            .fold(0i64, |acc, e| acc.saturating_add(e.current_stock)))
    }

    async fn totals_by_product(&self) -> Result<HashMap<ProductId, i64>, StoreError> {
        let state = self.state.lock().await;
        let mut totals = HashMap::new();
        for e in state.ledger.values() {
            let total = totals.entry(e.product_id).or_insert(0i64);
            *total = total.saturating_add(e.current_stock);
        }
        Ok(totals)
    }

    async fn entries_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.state.lock().await.entries(|e| e.product_id == product_id))
    }

    async fn entries_for_warehouse(
        &self,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.state.lock().await.entries(|e| e.warehouse_id == warehouse_id))
    }

    async fn all_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.state.lock().await.entries(|_| true))
    }
}

#[async_trait]
impl MovementLog for InMemoryInventoryStore {
    async fn query(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<Movement>, StoreError> {
        let state = self.state.lock().await;
        Ok(pagination.apply(state.newest_first(|m| filter.matches(m))))
    }

    async fn query_by_product(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        Ok(self.state.lock().await.newest_first(|m| m.product_id == product_id))
    }

    async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        product_id: Option<ProductId>,
    ) -> Result<Vec<Movement>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.newest_first(|m| {
            from <= m.created_at
                && m.created_at < to
                && product_id.is_none_or(|p| m.product_id == p)
        }))
    }

    async fn count_by_type_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<MovementTypeCounts, StoreError> {
        let state = self.state.lock().await;
        Ok(MovementTypeCounts::tally(
            state
                .movements
                .iter()
                .filter(|m| from <= m.created_at && m.created_at < to),
        ))
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            guard,
            staged_ledger: HashMap::new(),
            staged_movements: Vec::new(),
        }))
    }
}

/// Writes are staged next to the held guard and only merged on commit.
struct InMemoryTransaction {
    guard: OwnedMutexGuard<InventoryState>,
    staged_ledger: HashMap<LedgerKey, LedgerEntry>,
    staged_movements: Vec<Movement>,
}

#[async_trait]
impl InventoryTransaction for InMemoryTransaction {
    async fn get_balance(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<i64, StoreError> {
        let key = (product_id, warehouse_id);
        Ok(self
            .staged_ledger
            .get(&key)
            .or_else(|| self.guard.ledger.get(&key))
            .map(|e| e.current_stock)
            .unwrap_or(0))
    }

    async fn apply_delta(&mut self, delta: LedgerDelta) -> Result<LedgerEntry, StoreError> {
        let current = self.get_balance(delta.product_id, delta.warehouse_id).await?;
        let next = current.checked_add(delta.delta).ok_or_else(|| {
            StoreError::OutOfRange(format!(
                "stock of product {} in warehouse {} would overflow",
                delta.product_id, delta.warehouse_id
            ))
        })?;
        if next < 0 {
            return Err(StoreError::InsufficientStock {
                product_id: delta.product_id,
                warehouse_id: delta.warehouse_id,
            });
        }

        let entry = LedgerEntry {
            product_id: delta.product_id,
            warehouse_id: delta.warehouse_id,
            current_stock: next,
            updated_at: Utc::now(),
        };
        self.staged_ledger
            .insert((delta.product_id, delta.warehouse_id), entry.clone());
        Ok(entry)
    }

    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, StoreError> {
        let exists = self
            .guard
            .movements
            .iter()
            .chain(self.staged_movements.iter())
            .any(|m| m.id == movement.id);
        if exists {
            return Err(StoreError::Conflict(format!(
                "movement {} already recorded",
                movement.id
            )));
        }

        let recorded = movement.recorded_at(Utc::now());
        self.staged_movements.push(recorded.clone());
        Ok(recorded)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction {
            mut guard,
            staged_ledger,
            staged_movements,
        } = *self;
        guard.ledger.extend(staged_ledger);
        guard.movements.extend(staged_movements);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
