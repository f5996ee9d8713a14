use std::sync::Arc;

use thiserror::Error;

use stockledger_core::{ExpectedVersion, ProductId};
use stockledger_stock::{ProductStock, StockMovement};

use super::query::{MovementFilter, MovementPage, Pagination};

/// Stock store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// the domain errors the service surfaces to callers. `Conflict` is the
/// optimistic-locking retry signal: the product row moved between the
/// caller's read and its write. The service retries it a bounded number of
/// times; it never reaches the public error surface.
#[derive(Debug, Error)]
pub enum StockStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("product missing: {0}")]
    ProductMissing(ProductId),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Movement ledger + quantity projection, committed as one unit.
///
/// ## Design Principles
///
/// - **No storage assumptions**: works with an in-memory implementation
///   (tests/dev) and a Postgres backend (production)
/// - **Append-only ledger**: committed movements are never modified or
///   deleted
/// - **Optimistic locking**: via [`ExpectedVersion`] on the product record
/// - **Atomic dual-write**: `commit_movement` persists the movement AND sets
///   the projection quantity in the same transaction; on any failure neither
///   half is observable
///
/// ## Commit Semantics
///
/// `commit_movement`:
/// - resolves the product (missing product fails the commit)
/// - checks the product's current `version` against `expected`
/// - sets the product quantity to `new_quantity` and bumps `version` by one
/// - appends the movement record
///
/// A `Conflict` result means some other writer committed in between; the
/// caller reloads the product and recomputes before retrying.
///
/// ## Read Semantics
///
/// `movements_by_product` returns committed movements in `created_at`
/// ascending order (movement id as tiebreak), filtered and paginated. Calling
/// it twice without intervening writes returns identical pages.
pub trait StockStore: Send + Sync {
    /// Load the current projection snapshot for a product.
    fn load_product(&self, product_id: ProductId) -> Result<Option<ProductStock>, StockStoreError>;

    /// Register a product snapshot.
    ///
    /// Product records are owned by the surrounding catalog layer; this entry
    /// point exists for wiring and tests.
    fn insert_product(&self, product: ProductStock) -> Result<(), StockStoreError>;

    /// Atomically append `movement` and set its product's quantity to
    /// `new_quantity`, guarded by `expected` against the product version.
    fn commit_movement(
        &self,
        movement: StockMovement,
        expected: ExpectedVersion,
        new_quantity: i64,
    ) -> Result<StockMovement, StockStoreError>;

    /// Page through a product's committed movements, oldest first.
    fn movements_by_product(
        &self,
        product_id: ProductId,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StockStoreError>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn load_product(&self, product_id: ProductId) -> Result<Option<ProductStock>, StockStoreError> {
        (**self).load_product(product_id)
    }

    fn insert_product(&self, product: ProductStock) -> Result<(), StockStoreError> {
        (**self).insert_product(product)
    }

    fn commit_movement(
        &self,
        movement: StockMovement,
        expected: ExpectedVersion,
        new_quantity: i64,
    ) -> Result<StockMovement, StockStoreError> {
        (**self).commit_movement(movement, expected, new_quantity)
    }

    fn movements_by_product(
        &self,
        product_id: ProductId,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StockStoreError> {
        (**self).movements_by_product(product_id, filter, pagination)
    }
}
