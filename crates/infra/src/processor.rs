//! Movement Processor: the only path that changes stock.
//!
//! ```text
//! MovementRequest
//!   ↓
//! 1. Validate (type/warehouse shape, quantity, price)
//!   ↓
//! 2. Resolve product and warehouses in the catalog
//!   ↓
//! 3. Begin one store transaction
//!   ↓
//! 4. Append the movement to the log
//!   ↓
//! 5. Apply ledger deltas in warehouse-id order
//!   ↓
//! 6. Commit
//! ```
//!
//! A failure anywhere in steps 4-6 rolls the transaction back, so a movement
//! is either fully recorded (log row plus every balance change) or not
//! recorded at all.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use stockroom_core::UserId;
use stockroom_inventory::{LedgerDelta, Movement, MovementRequest, NewMovement};

use crate::catalog::CatalogStore;
use crate::error::{ServiceError, StoreError};
use crate::stock::{InventoryStore, InventoryTransaction};

#[derive(Clone)]
pub struct MovementProcessor {
    catalog: Arc<dyn CatalogStore>,
    store: Arc<dyn InventoryStore>,
}

impl MovementProcessor {
    pub fn new(catalog: Arc<dyn CatalogStore>, store: Arc<dyn InventoryStore>) -> Self {
        Self { catalog, store }
    }

    /// Record one movement on behalf of `user_id` and return the log record.
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            movement_type = %request.movement_type,
            quantity = request.quantity
        ),
        err
    )]
    pub async fn record(
        &self,
        request: MovementRequest,
        user_id: UserId,
    ) -> Result<Movement, ServiceError> {
        let draft = request.validate().map_err(|e| {
            warn!(error = %e, "movement rejected");
            ServiceError::from(e)
        })?;

        if self.catalog.get_product(draft.product_id).await?.is_none() {
            warn!("movement rejected: unknown product");
            return Err(ServiceError::NotFound(format!("product {}", draft.product_id)));
        }

        let wanted = draft.kind.warehouses();
        let found = self.catalog.warehouses_by_ids(&wanted).await?;
        if let Some(missing) = wanted.iter().find(|w| !found.iter().any(|f| f.id == **w)) {
            warn!(warehouse_id = %missing, "movement rejected: unknown warehouse");
            return Err(ServiceError::NotFound(format!("warehouse {missing}")));
        }

        let deltas = draft.deltas();
        let new_movement = draft.into_new_movement(user_id)?;

        let mut tx = self.store.begin().await?;
        match apply(tx.as_mut(), new_movement, &deltas).await {
            Ok(movement) => {
                tx.commit().await?;
                info!(
                    movement_id = %movement.id,
                    product_id = %movement.product_id,
                    movement_type = %movement.movement_type,
                    quantity = movement.quantity,
                    "movement recorded"
                );
                Ok(movement)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "movement rollback failed");
                } else {
                    warn!(error = %err, "movement rolled back");
                }
                Err(err)
            }
        }
    }
}

async fn apply(
    tx: &mut dyn InventoryTransaction,
    movement: NewMovement,
    deltas: &[LedgerDelta],
) -> Result<Movement, ServiceError> {
    let recorded = tx.append_movement(movement).await?;

    for delta in deltas {
        if delta.delta < 0 {
            let available = tx.get_balance(delta.product_id, delta.warehouse_id).await?;
            if available + delta.delta < 0 {
                return Err(ServiceError::InsufficientStock {
                    product_id: delta.product_id,
                    warehouse_id: delta.warehouse_id,
                    available,
                    requested: -delta.delta,
                });
            }
        }

        tx.apply_delta(*delta).await.map_err(|e| match e {
            StoreError::InsufficientStock {
                product_id,
                warehouse_id,
            } => ServiceError::InsufficientStock {
                product_id,
                warehouse_id,
                // Lost a race with a concurrent writer after the pre-check.
                available: 0,
                requested: -delta.delta,
            },
            other => other.into(),
        })?;
    }

    Ok(recorded)
}
