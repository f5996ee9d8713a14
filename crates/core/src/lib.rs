//! `stockledger-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod actor;
pub mod error;
pub mod id;
pub mod version;

pub use actor::ActorId;
pub use error::{StockError, StockResult};
pub use id::{MovementId, ProductId};
pub use version::ExpectedVersion;
