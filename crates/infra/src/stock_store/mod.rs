//! Atomic stock persistence boundary.
//!
//! This module defines the infrastructure-facing abstraction for the movement
//! ledger and the quantity projection without making storage assumptions. The
//! one contract every implementation must honor: a movement record and its
//! quantity update commit together or not at all.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use query::{MovementFilter, MovementPage, Pagination};
pub use r#trait::{StockStore, StockStoreError};
