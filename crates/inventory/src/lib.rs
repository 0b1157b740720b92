//! Inventory movement and stock-ledger domain.
//!
//! Deterministic rules only (no IO, no HTTP, no storage):
//! - how a movement request is validated into a closed [`MovementKind`]
//! - which ledger deltas a movement produces
//! - the strict balance arithmetic of the ledger
//! - low-stock classification and the day-bucketed read models

pub mod ledger;
pub mod movement;
pub mod summary;

pub use ledger::{checked_balance, derive_balances, is_low_stock, LedgerDelta, LedgerEntry};
pub use movement::{
    AdjustmentDirection, Movement, MovementDraft, MovementKind, MovementRequest, MovementType,
    NewMovement, Quantity, MAX_QUANTITY,
};
pub use summary::{summarize_days, DailyMovementSummary, DayWindow, MovementTypeCounts, SUMMARY_DAYS};
