use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, MovementId, ProductId, UserId, WarehouseId};

use crate::ledger::LedgerDelta;

/// Movement type as stored and transmitted (lowercase on the wire).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Entry,
    Exit,
    Transfer,
    Adjustment,
}

impl MovementType {
    pub const ALL: [MovementType; 4] = [Self::Entry, Self::Exit, Self::Transfer, Self::Adjustment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown movement type '{s}'")))
    }
}

/// Largest quantity one movement may carry (a 32-bit integer column).
pub const MAX_QUANTITY: i64 = i32::MAX as i64;

/// Movement quantity in `1..=MAX_QUANTITY`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be a positive integer, got {value}"
            )));
        }
        if value > MAX_QUANTITY {
            return Err(DomainError::validation(format!(
                "quantity must not exceed {MAX_QUANTITY}, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
}

/// What a movement does to stock, with exactly the warehouses it needs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MovementKind {
    Entry {
        destination: WarehouseId,
    },
    Exit {
        source: WarehouseId,
    },
    Transfer {
        source: WarehouseId,
        destination: WarehouseId,
    },
    /// Manual correction at a single warehouse.
    Adjustment {
        warehouse: WarehouseId,
        direction: AdjustmentDirection,
    },
}

impl MovementKind {
    /// Rebuild a kind from the flat `(type, source, destination)` columns.
    ///
    /// An adjustment names exactly one warehouse: a destination means
    /// increase, a source means decrease.
    pub fn from_parts(
        movement_type: MovementType,
        source: Option<WarehouseId>,
        destination: Option<WarehouseId>,
    ) -> DomainResult<Self> {
        match (movement_type, source, destination) {
            (MovementType::Entry, None, Some(destination)) => Ok(Self::Entry { destination }),
            (MovementType::Entry, Some(_), _) => Err(DomainError::validation(
                "entry movements cannot have a source warehouse",
            )),
            (MovementType::Entry, None, None) => Err(DomainError::validation(
                "entry movements require destination_warehouse_id",
            )),

            (MovementType::Exit, Some(source), None) => Ok(Self::Exit { source }),
            (MovementType::Exit, _, Some(_)) => Err(DomainError::validation(
                "exit movements cannot have a destination warehouse",
            )),
            (MovementType::Exit, None, None) => Err(DomainError::validation(
                "exit movements require source_warehouse_id",
            )),

            (MovementType::Transfer, Some(source), Some(destination)) => {
                if source == destination {
                    return Err(DomainError::validation(
                        "transfer source and destination warehouses must differ",
                    ));
                }
                Ok(Self::Transfer {
                    source,
                    destination,
                })
            }
            (MovementType::Transfer, _, _) => Err(DomainError::validation(
                "transfer movements require both source_warehouse_id and destination_warehouse_id",
            )),

            (MovementType::Adjustment, None, Some(warehouse)) => Ok(Self::Adjustment {
                warehouse,
                direction: AdjustmentDirection::Increase,
            }),
            (MovementType::Adjustment, Some(warehouse), None) => Ok(Self::Adjustment {
                warehouse,
                direction: AdjustmentDirection::Decrease,
            }),
            (MovementType::Adjustment, _, _) => Err(DomainError::validation(
                "adjustment movements require exactly one of source_warehouse_id (decrease) \
                 or destination_warehouse_id (increase)",
            )),
        }
    }

    pub fn movement_type(&self) -> MovementType {
        match self {
            Self::Entry { .. } => MovementType::Entry,
            Self::Exit { .. } => MovementType::Exit,
            Self::Transfer { .. } => MovementType::Transfer,
            Self::Adjustment { .. } => MovementType::Adjustment,
        }
    }

    pub fn source(&self) -> Option<WarehouseId> {
        match *self {
            Self::Exit { source } | Self::Transfer { source, .. } => Some(source),
            Self::Adjustment {
                warehouse,
                direction: AdjustmentDirection::Decrease,
            } => Some(warehouse),
            _ => None,
        }
    }

    pub fn destination(&self) -> Option<WarehouseId> {
        match *self {
            Self::Entry { destination } | Self::Transfer { destination, .. } => Some(destination),
            Self::Adjustment {
                warehouse,
                direction: AdjustmentDirection::Increase,
            } => Some(warehouse),
            _ => None,
        }
    }

    /// Every warehouse this movement touches.
    pub fn warehouses(&self) -> Vec<WarehouseId> {
        self.source().into_iter().chain(self.destination()).collect()
    }

    /// Ledger deltas for `product_id`, ordered by warehouse id.
    ///
    /// The fixed order lets concurrent writers lock ledger rows in the same
    /// sequence.
    pub fn deltas(&self, product_id: ProductId, quantity: Quantity) -> Vec<LedgerDelta> {
        let q = quantity.get();
        let mut deltas: Vec<LedgerDelta> = self
            .source()
            .map(|w| LedgerDelta::new(product_id, w, -q))
            .into_iter()
            .chain(self.destination().map(|w| LedgerDelta::new(product_id, w, q)))
            .collect();
        deltas.sort_by_key(|d| d.warehouse_id);
        deltas
    }
}

/// Untrusted movement input, as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: i64,
    #[serde(default)]
    pub source_warehouse_id: Option<WarehouseId>,
    #[serde(default)]
    pub destination_warehouse_id: Option<WarehouseId>,
    /// Price per unit in the smallest currency unit.
    #[serde(default)]
    pub unit_price: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl MovementRequest {
    pub fn validate(self) -> DomainResult<MovementDraft> {
        let quantity = Quantity::new(self.quantity)?;
        let kind = MovementKind::from_parts(
            self.movement_type,
            self.source_warehouse_id,
            self.destination_warehouse_id,
        )?;

        if matches!(self.unit_price, Some(p) if p < 0) {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }

        Ok(MovementDraft {
            product_id: self.product_id,
            kind,
            quantity,
            unit_price: self.unit_price,
            reason: self
                .reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        })
    }
}

/// A validated movement that has not been recorded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: Quantity,
    pub unit_price: Option<i64>,
    pub reason: Option<String>,
}

impl MovementDraft {
    pub fn deltas(&self) -> Vec<LedgerDelta> {
        self.kind.deltas(self.product_id, self.quantity)
    }

    pub fn total_value(&self) -> DomainResult<Option<i64>> {
        self.unit_price
            .map(|price| {
                price.checked_mul(self.quantity.get()).ok_or_else(|| {
                    DomainError::validation("unit_price * quantity overflows")
                })
            })
            .transpose()
    }

    /// Attach the acting user and the log-assigned identity.
    pub fn into_new_movement(self, user_id: UserId) -> DomainResult<NewMovement> {
        let total_value = self.total_value()?;
        Ok(NewMovement {
            id: MovementId::new(),
            product_id: self.product_id,
            kind: self.kind,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_value,
            reason: self.reason,
            user_id,
        })
    }
}

/// A movement ready to be appended to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: Quantity,
    pub unit_price: Option<i64>,
    pub total_value: Option<i64>,
    pub reason: Option<String>,
    pub user_id: UserId,
}

impl NewMovement {
    pub fn recorded_at(self, created_at: DateTime<Utc>) -> Movement {
        Movement {
            id: self.id,
            product_id: self.product_id,
            movement_type: self.kind.movement_type(),
            quantity: self.quantity.get(),
            source_warehouse_id: self.kind.source(),
            destination_warehouse_id: self.kind.destination(),
            unit_price: self.unit_price,
            total_value: self.total_value,
            reason: self.reason,
            user_id: self.user_id,
            created_at,
        }
    }
}

/// Immutable movement log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: i64,
    pub source_warehouse_id: Option<WarehouseId>,
    pub destination_warehouse_id: Option<WarehouseId>,
    pub unit_price: Option<i64>,
    pub total_value: Option<i64>,
    pub reason: Option<String>,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    pub fn kind(&self) -> DomainResult<MovementKind> {
        MovementKind::from_parts(
            self.movement_type,
            self.source_warehouse_id,
            self.destination_warehouse_id,
        )
    }

    /// The ledger effect this record had when it was committed.
    pub fn deltas(&self) -> DomainResult<Vec<LedgerDelta>> {
        Ok(self.kind()?.deltas(self.product_id, Quantity::new(self.quantity)?))
    }
}
