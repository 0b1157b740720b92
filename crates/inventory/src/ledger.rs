//! Stock ledger rows and balance arithmetic.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ProductId, WarehouseId};

use crate::movement::Movement;

/// Current balance of one product in one warehouse.
///
/// Rows are created lazily by the first movement that touches the pair and
/// are never deleted; a zero balance is a real row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub current_stock: i64,
    pub updated_at: DateTime<Utc>,
}

/// Signed change to a single ledger row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerDelta {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub delta: i64,
}

impl LedgerDelta {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId, delta: i64) -> Self {
        Self {
            product_id,
            warehouse_id,
            delta,
        }
    }
}

/// Apply `delta` to `current`, refusing to go below zero.
///
/// Over-withdrawals are rejected, never clamped.
pub fn checked_balance(current: i64, delta: i64) -> DomainResult<i64> {
    let next = current
        .checked_add(delta)
        .ok_or_else(|| DomainError::invariant("stock balance overflow"))?;
    if next < 0 {
        return Err(DomainError::invariant(format!(
            "insufficient stock: available {current}, requested {}",
            -delta
        )));
    }
    Ok(next)
}

/// Low stock means at or below the configured minimum.
pub fn is_low_stock(current_stock: i64, min_stock: i64) -> bool {
    current_stock <= min_stock
}

/// Replay a movement history into per-(product, warehouse) balances.
///
/// Movements are applied oldest first regardless of input order.
pub fn derive_balances(
    movements: &[Movement],
) -> DomainResult<BTreeMap<(ProductId, WarehouseId), i64>> {
    let mut ordered: Vec<&Movement> = movements.iter().collect();
    ordered.sort_by_key(|m| (m.created_at, m.id));

    let mut balances = BTreeMap::new();
    for movement in ordered {
        for d in movement.deltas()? {
            let slot = balances.entry((d.product_id, d.warehouse_id)).or_insert(0);
            *slot = checked_balance(*slot, d.delta)?;
        }
    }
    Ok(balances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{MovementRequest, MovementType};
    use proptest::prelude::*;
    use stockroom_core::UserId;

    #[test]
    fn withdrawal_to_exactly_zero_is_allowed() {
        assert_eq!(checked_balance(2, -2).unwrap(), 0);
    }

    #[test]
    fn over_withdrawal_is_rejected_not_clamped() {
        let err = checked_balance(2, -999).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("insufficient stock")),
            _ => panic!("Expected InvariantViolation for over-withdrawal"),
        }
    }

    #[test]
    fn low_stock_boundary_is_inclusive() {
        assert!(is_low_stock(10, 10));
        assert!(!is_low_stock(11, 10));
        assert!(is_low_stock(0, 0));
    }

    fn record(
        product_id: ProductId,
        movement_type: MovementType,
        quantity: i64,
        source: Option<WarehouseId>,
        destination: Option<WarehouseId>,
        offset_secs: i64,
    ) -> Movement {
        MovementRequest {
            product_id,
            movement_type,
            quantity,
            source_warehouse_id: source,
            destination_warehouse_id: destination,
            unit_price: None,
            reason: None,
        }
        .validate()
        .unwrap()
        .into_new_movement(UserId::new())
        .unwrap()
        .recorded_at(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(offset_secs))
    }

    #[test]
    fn derive_balances_replays_scenario_in_time_order() {
        let p = ProductId::new();
        let (w, w2) = (WarehouseId::new(), WarehouseId::new());
        let history = vec![
            record(p, MovementType::Transfer, 2, Some(w), Some(w2), 3),
            record(p, MovementType::Entry, 20, None, Some(w), 1),
            record(p, MovementType::Exit, 18, Some(w), None, 2),
        ];

        let balances = derive_balances(&history).unwrap();
        assert_eq!(balances[&(p, w)], 0);
        assert_eq!(balances[&(p, w2)], 2);
    }

    mod proptest_tests {
        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            Entry(usize, i64),
            Exit(usize, i64),
            Transfer(usize, usize, i64),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0usize..3, 1i64..50).prop_map(|(w, q)| Op::Entry(w, q)),
                (0usize..3, 1i64..50).prop_map(|(w, q)| Op::Exit(w, q)),
                (0usize..3, 0usize..3, 1i64..50).prop_map(|(a, b, q)| Op::Transfer(a, b, q)),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: accepted movements keep every balance equal to the signed
            /// sum of their deltas, and that sum never dips below zero.
            #[test]
            fn balances_equal_signed_sum_of_accepted_deltas(ops in prop::collection::vec(op(), 0..40)) {
                let product = ProductId::new();
                let warehouses = [WarehouseId::new(), WarehouseId::new(), WarehouseId::new()];
                let mut balances = [0i64; 3];
                let mut accepted = Vec::new();

                for (i, op) in ops.into_iter().enumerate() {
                    let (movement_type, source, destination, q) = match op {
                        Op::Entry(w, q) => (MovementType::Entry, None, Some(w), q),
                        Op::Exit(w, q) => (MovementType::Exit, Some(w), None, q),
                        Op::Transfer(a, b, q) => (MovementType::Transfer, Some(a), Some(b), q),
                    };
                    if source.is_some() && source == destination {
                        continue;
                    }

                    let mut next = balances;
                    let mut ok = true;
                    if let Some(s) = source {
                        match checked_balance(next[s], -q) {
                            Ok(v) => next[s] = v,
                            Err(_) => ok = false,
                        }
                    }
                    if let Some(d) = destination {
                        next[d] = checked_balance(next[d], q).unwrap();
                    }
                    if !ok {
                        continue;
                    }
                    balances = next;
                    accepted.push(record(
                        product,
                        movement_type,
                        q,
                        source.map(|s| warehouses[s]),
                        destination.map(|d| warehouses[d]),
                        i as i64,
                    ));
                }

                let derived = derive_balances(&accepted).unwrap();
                for (idx, w) in warehouses.iter().enumerate() {
                    let got = derived.get(&(product, *w)).copied().unwrap_or(0);
                    prop_assert_eq!(got, balances[idx]);
                    prop_assert!(got >= 0);
                }
            }
        }
    }
}
