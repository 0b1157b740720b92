//! Stock ledger and movement log boundary.
//!
//! Reads go through [`StockLedger`] and [`MovementLog`]. The only write path
//! is an [`InventoryTransaction`] obtained from [`InventoryStore::begin`]: a
//! movement's log append and its ledger deltas commit together or not at
//! all.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Page, Pagination, ProductId, WarehouseId};
use stockroom_inventory::{LedgerDelta, LedgerEntry, Movement, MovementType, MovementTypeCounts, NewMovement};

use crate::error::StoreError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

/// Filter for movement log queries. Bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub movement_type: Option<MovementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl MovementFilter {
    pub fn matches(&self, m: &Movement) -> bool {
        self.product_id.is_none_or(|p| m.product_id == p)
            && self.movement_type.is_none_or(|t| m.movement_type == t)
            && self.from.is_none_or(|from| m.created_at >= from)
            && self.to.is_none_or(|to| m.created_at <= to)
    }
}

/// Read side of the stock ledger.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Balance of one pair; a missing row reads as zero.
    async fn get_balance(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<i64, StoreError>;

    /// Sum of a product's balances, optionally restricted to some warehouses.
    async fn sum_balances(
        &self,
        product_id: ProductId,
        warehouse_ids: Option<&[WarehouseId]>,
    ) -> Result<i64, StoreError>;

    /// Summed balance of every product that has ledger rows.
    async fn totals_by_product(&self) -> Result<HashMap<ProductId, i64>, StoreError>;

    async fn entries_for_product(&self, product_id: ProductId)
        -> Result<Vec<LedgerEntry>, StoreError>;

    async fn entries_for_warehouse(
        &self,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn all_entries(&self) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// Read side of the append-only movement log. Results are newest first.
#[async_trait]
pub trait MovementLog: Send + Sync {
    async fn query(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<Movement>, StoreError>;

    async fn query_by_product(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError>;

    async fn recent(&self, limit: u32) -> Result<Vec<Movement>, StoreError> {
        let page = self
            .query(MovementFilter::default(), Pagination::new(Some(limit), None))
            .await?;
        Ok(page.items)
    }

    /// Movements created in `[from, to)`, optionally for one product.
    async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        product_id: Option<ProductId>,
    ) -> Result<Vec<Movement>, StoreError>;

    /// Per-type counts of movements created in `[from, to)`.
    async fn count_by_type_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<MovementTypeCounts, StoreError>;
}

/// One all-or-nothing unit of ledger and log writes.
///
/// Dropping a transaction without calling [`commit`](Self::commit) discards
/// every write made through it.
#[async_trait]
pub trait InventoryTransaction: Send {
    /// Balance as seen inside this transaction (including its own writes).
    async fn get_balance(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<i64, StoreError>;

    /// Atomically add `delta` to a ledger row, creating the row if needed.
    ///
    /// Fails with [`StoreError::InsufficientStock`] if the balance would go
    /// negative.
    async fn apply_delta(&mut self, delta: LedgerDelta) -> Result<LedgerEntry, StoreError>;

    /// Append to the movement log, assigning the creation timestamp.
    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait InventoryStore: StockLedger + MovementLog {
    async fn begin(&self) -> Result<Box<dyn InventoryTransaction>, StoreError>;
}
