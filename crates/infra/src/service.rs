//! Stock projection updater (application-level orchestration).
//!
//! This module is the single public entry point for changing a product's
//! on-hand quantity. It keeps the quantity projection and the movement
//! ledger mutually consistent:
//!
//! ```text
//! MovementDraft
//!   ↓
//! 1. Validate input (before any product read)
//!   ↓
//! 2. Load the product projection snapshot
//!   ↓
//! 3. Compute the candidate quantity (reject OUT below zero)
//!   ↓
//! 4. Commit movement + quantity atomically (CAS on product version)
//!   ↓
//! 5. Retry bounded times on conflict, else return the receipt
//! ```
//!
//! ## Concurrency
//!
//! Writers on the same product serialize through the store's version check:
//! whoever commits first wins, the loser reloads and recomputes. A conflict
//! therefore implies another writer made progress, so the retry loop cannot
//! livelock; its bound only converts pathological contention into
//! `PersistenceFailure`. Writers on different products never contend.
//!
//! ## Cancellation
//!
//! Abandoning a call before the commit step leaves no visible state: the
//! store either committed both halves or nothing.

use chrono::Utc;

use stockledger_core::{ExpectedVersion, MovementId, ProductId, StockError, StockResult};
use stockledger_stock::{next_quantity, MovementDraft, ProductStock, StockMovement};

use crate::stock_store::{MovementFilter, MovementPage, Pagination, StockStore, StockStoreError};

/// Internal retry bound for optimistic-concurrency conflicts.
const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Page size used when replaying a full ledger for reconciliation.
const RECONCILE_PAGE_SIZE: u32 = 500;

impl From<StockStoreError> for StockError {
    fn from(value: StockStoreError) -> Self {
        match value {
            // Conflicts are handled by the retry loop; one that escapes means
            // retries were exhausted.
            StockStoreError::Conflict(msg) => {
                StockError::persistence(format!("concurrent update: {msg}"))
            }
            StockStoreError::ProductMissing(id) => StockError::product_not_found(id),
            StockStoreError::Storage(msg) => StockError::persistence(msg),
        }
    }
}

/// Result of a successful [`StockService::record_movement`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementReceipt {
    /// The product projection as committed.
    pub product: ProductStock,
    /// The persisted movement fact.
    pub movement: StockMovement,
}

/// Result of replaying a product's ledger against its projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub product_id: ProductId,
    /// Quantity currently stored in the projection.
    pub projected_quantity: i64,
    /// Net sum of the committed movement history.
    pub derived_quantity: i64,
    pub movement_count: u64,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.projected_quantity == self.derived_quantity
    }
}

/// Public operation layer over a [`StockStore`].
#[derive(Debug)]
pub struct StockService<S> {
    store: S,
}

impl<S> StockService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> StockService<S>
where
    S: StockStore,
{
    /// Record a stock movement and update the product's quantity, atomically.
    ///
    /// Returns the updated projection snapshot and the persisted movement.
    /// On any error path nothing is persisted; `PersistenceFailure` results
    /// are safe to retry with the same input.
    pub fn record_movement(&self, draft: MovementDraft) -> StockResult<MovementReceipt> {
        draft.validate()?;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let product = self
                .store
                .load_product(draft.product_id)?
                .ok_or_else(|| StockError::product_not_found(draft.product_id))?;

            let candidate = next_quantity(product.quantity, draft.direction, draft.quantity)?;

            let movement = draft
                .clone()
                .into_movement(MovementId::new(), Utc::now());

            match self.store.commit_movement(
                movement,
                ExpectedVersion::Exact(product.version),
                candidate,
            ) {
                Ok(movement) => {
                    tracing::debug!(
                        product_id = %draft.product_id,
                        movement_id = %movement.id,
                        direction = %movement.direction,
                        quantity = movement.quantity,
                        new_quantity = candidate,
                        "stock movement committed"
                    );
                    return Ok(MovementReceipt {
                        product: product.with_quantity(candidate),
                        movement,
                    });
                }
                Err(StockStoreError::Conflict(msg)) if attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::warn!(
                        product_id = %draft.product_id,
                        attempt,
                        "stock commit conflicted, retrying: {msg}"
                    );
                }
                Err(StockStoreError::Conflict(msg)) => {
                    return Err(StockError::persistence(format!(
                        "commit retries exhausted after {attempt} attempts: {msg}"
                    )));
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Page through a product's committed movements, oldest first.
    ///
    /// Audit/reconciliation path; fails with `ProductNotFound` for unknown
    /// products rather than returning an empty ledger.
    pub fn movements(
        &self,
        product_id: ProductId,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> StockResult<MovementPage> {
        self.store
            .load_product(product_id)?
            .ok_or_else(|| StockError::product_not_found(product_id))?;

        Ok(self
            .store
            .movements_by_product(product_id, filter, pagination)?)
    }

    /// Replay a product's full ledger and compare the derived net quantity
    /// against the stored projection.
    ///
    /// The projection is derived state; this makes its derivability
    /// executable. For a product whose quantity history is fully captured by
    /// the ledger (inception at zero), an inconsistent report indicates
    /// corruption outside this core: the commit path cannot produce one. A
    /// snapshot seeded with pre-ledger stock shows that seed as the constant
    /// difference between the two quantities.
    pub fn reconcile(&self, product_id: ProductId) -> StockResult<ReconciliationReport> {
        let product = self
            .store
            .load_product(product_id)?
            .ok_or_else(|| StockError::product_not_found(product_id))?;

        let filter = MovementFilter::default();
        let mut derived_quantity = 0i64;
        let mut movement_count = 0u64;
        let mut offset = 0u32;

        loop {
            let page = self.store.movements_by_product(
                product_id,
                &filter,
                Pagination::new(Some(RECONCILE_PAGE_SIZE), Some(offset)),
            )?;

            for movement in &page.movements {
                derived_quantity += movement.signed_quantity();
            }
            movement_count += page.movements.len() as u64;

            if !page.has_more || page.movements.is_empty() {
                break;
            }
            offset += page.movements.len() as u32;
        }

        Ok(ReconciliationReport {
            product_id,
            projected_quantity: product.quantity,
            derived_quantity,
            movement_count,
        })
    }
}
