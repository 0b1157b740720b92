//! Infrastructure layer: stores, the movement processor and report queries.
//!
//! Every store comes as a trait with an in-memory implementation (tests/dev)
//! and a Postgres implementation.

pub mod catalog;
pub mod db;
pub mod error;
pub mod processor;
pub mod reports;
pub mod stock;

mod integration_tests;

pub use error::{ServiceError, StoreError};
pub use processor::MovementProcessor;
pub use reports::InventoryReports;
