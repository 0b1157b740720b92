//! Postgres-backed stock ledger and movement log.
//!
//! Ledger writes are single atomic statements (`current_stock =
//! current_stock + $delta`), so concurrent movements on the same row
//! serialise on the row lock instead of racing a read-then-write. The
//! `inventory_current_stock_non_negative` check constraint is what finally
//! rejects an over-withdrawal.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockroom_core::{MovementId, Page, Pagination, ProductId, UserId, WarehouseId};
use stockroom_inventory::{LedgerDelta, LedgerEntry, Movement, MovementType, MovementTypeCounts, NewMovement};

use super::{InventoryStore, InventoryTransaction, MovementFilter, MovementLog, StockLedger};
use crate::db::{decode_error, is_check_violation, map_sqlx_error};
use crate::error::StoreError;

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, source_warehouse_id, \
     destination_warehouse_id, unit_price, total_value, reason, user_id, created_at";

const LEDGER_COLUMNS: &str = "product_id, warehouse_id, current_stock, updated_at";

/// Ledger sums are clamped to this so they always decode as `BIGINT`.
const BIGINT_MAX: i64 = i64::MAX;

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl StockLedger for PostgresInventoryStore {
    #[instrument(skip(self), fields(product_id = %product_id, warehouse_id = %warehouse_id), err)]
    async fn get_balance(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "SELECT current_stock FROM inventory WHERE product_id = $1 AND warehouse_id = $2",
        )
        .bind(product_id.as_uuid())
        .bind(warehouse_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_balance", e))?;

        match row {
            Some(row) => row
                .try_get("current_stock")
                .map_err(|e| decode_error("current_stock", e)),
            None => Ok(0),
        }
    }

    #[instrument(skip(self, warehouse_ids), fields(product_id = %product_id), err)]
    async fn sum_balances(
        &self,
        product_id: ProductId,
        warehouse_ids: Option<&[WarehouseId]>,
    ) -> Result<i64, StoreError> {
        let scope: Option<Vec<Uuid>> =
            warehouse_ids.map(|ws| ws.iter().map(|w| *w.as_uuid()).collect());

        let row = sqlx::query(&format!(
            r#"
            SELECT LEAST(COALESCE(SUM(current_stock), 0), {BIGINT_MAX})::BIGINT AS total
            FROM inventory
            WHERE product_id = $1
                AND ($2::uuid[] IS NULL OR warehouse_id = ANY($2))
            "#
        ))
        .bind(product_id.as_uuid())
        .bind(scope)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sum_balances", e))?;

        row.try_get("total").map_err(|e| decode_error("total", e))
    }

    #[instrument(skip(self), err)]
    async fn totals_by_product(&self) -> Result<HashMap<ProductId, i64>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT product_id, LEAST(SUM(current_stock), {BIGINT_MAX})::BIGINT AS total \
             FROM inventory GROUP BY product_id"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("totals_by_product", e))?;

        rows.iter()
            .map(|row| {
                let product_id: Uuid = row.try_get("product_id").map_err(|e| decode_error("product_id", e))?;
                let total: i64 = row.try_get("total").map_err(|e| decode_error("total", e))?;
                Ok((ProductId::from_uuid(product_id), total))
            })
            .collect()
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn entries_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEDGER_COLUMNS} FROM inventory WHERE product_id = $1 ORDER BY warehouse_id"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("entries_for_product", e))?;

        rows.iter().map(ledger_entry_from_row).collect()
    }

    #[instrument(skip(self), fields(warehouse_id = %warehouse_id), err)]
    async fn entries_for_warehouse(
        &self,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEDGER_COLUMNS} FROM inventory WHERE warehouse_id = $1 ORDER BY product_id"
        ))
        .bind(warehouse_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("entries_for_warehouse", e))?;

        rows.iter().map(ledger_entry_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn all_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEDGER_COLUMNS} FROM inventory ORDER BY product_id, warehouse_id"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("all_entries", e))?;

        rows.iter().map(ledger_entry_from_row).collect()
    }
}

#[async_trait]
impl MovementLog for PostgresInventoryStore {
    #[instrument(skip(self, filter), fields(limit = pagination.limit, offset = pagination.offset), err)]
    async fn query(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<Movement>, StoreError> {
        let product_param: Option<Uuid> = filter.product_id.map(|p| *p.as_uuid());
        let type_param: Option<&str> = filter.movement_type.as_ref().map(|t| t.as_str());

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM movements
            WHERE ($1::uuid IS NULL OR product_id = $1)
                AND ($2::text IS NULL OR movement_type = $2)
                AND ($3::timestamptz IS NULL OR created_at >= $3)
                AND ($4::timestamptz IS NULL OR created_at <= $4)
            "#,
        )
        .bind(product_param)
        .bind(type_param)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_movements", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| decode_error("count", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM movements
            WHERE ($1::uuid IS NULL OR product_id = $1)
                AND ($2::text IS NULL OR movement_type = $2)
                AND ($3::timestamptz IS NULL OR created_at >= $3)
                AND ($4::timestamptz IS NULL OR created_at <= $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(product_param)
        .bind(type_param)
        .bind(filter.from)
        .bind(filter.to)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_movements", e))?;

        let items = rows.iter().map(movement_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total.max(0) as u64, pagination))
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn query_by_product(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE product_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_by_product", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        product_id: Option<ProductId>,
    ) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM movements
            WHERE created_at >= $1 AND created_at < $2
                AND ($3::uuid IS NULL OR product_id = $3)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(from)
        .bind(to)
        .bind(product_id.map(|p| *p.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("created_between", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn count_by_type_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<MovementTypeCounts, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT movement_type, COUNT(*) AS n
            FROM movements
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY movement_type
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_by_type_between", e))?;

        let mut counts = MovementTypeCounts::default();
        for row in rows {
            let raw: String = row.try_get("movement_type").map_err(|e| decode_error("movement_type", e))?;
            let n: i64 = row.try_get("n").map_err(|e| decode_error("count", e))?;
            let movement_type = MovementType::from_str(&raw).map_err(|e| decode_error("movement_type", e))?;
            counts.add(movement_type, n.max(0) as u64);
        }
        Ok(counts)
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Box<dyn InventoryTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// Wraps one `sqlx` transaction; dropping it without commit rolls back.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl InventoryTransaction for PostgresTransaction {
    async fn get_balance(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "SELECT current_stock FROM inventory WHERE product_id = $1 AND warehouse_id = $2",
        )
        .bind(product_id.as_uuid())
        .bind(warehouse_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("tx_get_balance", e))?;

        match row {
            Some(row) => row
                .try_get("current_stock")
                .map_err(|e| decode_error("current_stock", e)),
            None => Ok(0),
        }
    }

    #[instrument(
        skip(self),
        fields(
            product_id = %delta.product_id,
            warehouse_id = %delta.warehouse_id,
            delta = delta.delta
        ),
        err
    )]
    async fn apply_delta(&mut self, delta: LedgerDelta) -> Result<LedgerEntry, StoreError> {
        let insufficient = || StoreError::InsufficientStock {
            product_id: delta.product_id,
            warehouse_id: delta.warehouse_id,
        };

        // A withdrawal can only hit an existing row; an INSERT of a negative
        // row would trip the check constraint even when it would conflict.
        let sql = if delta.delta < 0 {
            format!(
                r#"
                UPDATE inventory
                SET current_stock = current_stock + $3, updated_at = NOW()
                WHERE product_id = $1 AND warehouse_id = $2
                RETURNING {LEDGER_COLUMNS}
                "#
            )
        } else {
            format!(
                r#"
                INSERT INTO inventory (product_id, warehouse_id, current_stock, updated_at)
                VALUES ($1, $2, $3, NOW())
                ON CONFLICT (product_id, warehouse_id)
                DO UPDATE SET
                    current_stock = inventory.current_stock + EXCLUDED.current_stock,
                    updated_at = NOW()
                RETURNING {LEDGER_COLUMNS}
                "#
            )
        };

        let row = sqlx::query(&sql)
            .bind(delta.product_id.as_uuid())
            .bind(delta.warehouse_id.as_uuid())
            .bind(delta.delta)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_check_violation(&e) {
                    insufficient()
                } else {
                    map_sqlx_error("apply_delta", e)
                }
            })?;

        match row {
            Some(row) => ledger_entry_from_row(&row),
            None => Err(insufficient()),
        }
    }

    #[instrument(skip(self, movement), fields(movement_id = %movement.id), err)]
    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, StoreError> {
        let movement_type = movement.kind.movement_type();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO movements (
                id, product_id, movement_type, quantity, source_warehouse_id,
                destination_warehouse_id, unit_price, total_value, reason, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        ))
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement_type.as_str())
        .bind(movement.quantity.get())
        .bind(movement.kind.source().map(|w| *w.as_uuid()))
        .bind(movement.kind.destination().map(|w| *w.as_uuid()))
        .bind(movement.unit_price)
        .bind(movement.total_value)
        .bind(movement.reason.as_deref())
        .bind(movement.user_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_movement", e))?;

        movement_from_row(&row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn ledger_entry_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let product_id: Uuid = row.try_get("product_id").map_err(|e| decode_error("product_id", e))?;
    let warehouse_id: Uuid = row
        .try_get("warehouse_id")
        .map_err(|e| decode_error("warehouse_id", e))?;
    Ok(LedgerEntry {
        product_id: ProductId::from_uuid(product_id),
        warehouse_id: WarehouseId::from_uuid(warehouse_id),
        current_stock: row
            .try_get("current_stock")
            .map_err(|e| decode_error("current_stock", e))?,
        updated_at: row.try_get("updated_at").map_err(|e| decode_error("updated_at", e))?,
    })
}

fn movement_from_row(row: &PgRow) -> Result<Movement, StoreError> {
    let get_uuid = |col: &str| -> Result<Uuid, StoreError> {
        row.try_get(col).map_err(|e| decode_error(col, e))
    };
    let get_opt_uuid = |col: &str| -> Result<Option<Uuid>, StoreError> {
        row.try_get(col).map_err(|e| decode_error(col, e))
    };

    let raw_type: String = row
        .try_get("movement_type")
        .map_err(|e| decode_error("movement_type", e))?;

    Ok(Movement {
        id: MovementId::from_uuid(get_uuid("id")?),
        product_id: ProductId::from_uuid(get_uuid("product_id")?),
        movement_type: MovementType::from_str(&raw_type)
            .map_err(|e| decode_error("movement_type", e))?,
        quantity: row.try_get("quantity").map_err(|e| decode_error("quantity", e))?,
        source_warehouse_id: get_opt_uuid("source_warehouse_id")?.map(WarehouseId::from_uuid),
        destination_warehouse_id: get_opt_uuid("destination_warehouse_id")?
            .map(WarehouseId::from_uuid),
        unit_price: row.try_get("unit_price").map_err(|e| decode_error("unit_price", e))?,
        total_value: row
            .try_get("total_value")
            .map_err(|e| decode_error("total_value", e))?,
        reason: row.try_get("reason").map_err(|e| decode_error("reason", e))?,
        user_id: UserId::from_uuid(get_uuid("user_id")?),
        created_at: row.try_get("created_at").map_err(|e| decode_error("created_at", e))?,
    })
}
