use std::collections::HashMap;
use std::sync::RwLock;

use stockledger_core::{ExpectedVersion, ProductId};
use stockledger_stock::{ProductStock, StockMovement};

use super::query::{MovementFilter, MovementPage, Pagination};
use super::r#trait::{StockStore, StockStoreError};

/// In-memory stock store.
///
/// Intended for tests/dev. Both maps live behind a single lock so the
/// movement append and the quantity update commit under one writer critical
/// section.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<ProductId, ProductStock>,
    movements: HashMap<ProductId, Vec<StockMovement>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StockStore for InMemoryStockStore {
    fn load_product(&self, product_id: ProductId) -> Result<Option<ProductStock>, StockStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StockStoreError::Storage("lock poisoned".to_string()))?;

        Ok(inner.products.get(&product_id).cloned())
    }

    fn insert_product(&self, product: ProductStock) -> Result<(), StockStoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StockStoreError::Storage("lock poisoned".to_string()))?;

        inner.products.insert(product.product_id, product);
        Ok(())
    }

    fn commit_movement(
        &self,
        movement: StockMovement,
        expected: ExpectedVersion,
        new_quantity: i64,
    ) -> Result<StockMovement, StockStoreError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| StockStoreError::Storage("lock poisoned".to_string()))?;
        let inner = &mut *guard;

        let product_id = movement.product_id;
        let product = inner
            .products
            .get_mut(&product_id)
            .ok_or(StockStoreError::ProductMissing(product_id))?;

        if !expected.matches(product.version) {
            return Err(StockStoreError::Conflict(format!(
                "expected {expected:?}, found {}",
                product.version
            )));
        }

        // Dual-write under the held writer lock: projection then ledger.
        product.quantity = new_quantity;
        product.version += 1;
        inner
            .movements
            .entry(product_id)
            .or_default()
            .push(movement.clone());

        Ok(movement)
    }

    fn movements_by_product(
        &self,
        product_id: ProductId,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StockStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StockStoreError::Storage("lock poisoned".to_string()))?;

        let mut matching: Vec<StockMovement> = inner
            .movements
            .get(&product_id)
            .map(|all| all.iter().filter(|m| filter.matches(m)).cloned().collect())
            .unwrap_or_default();

        // Commit order is already created_at order, but make the contract
        // explicit: created_at ascending, time-ordered id as tiebreak.
        matching.sort_by_key(|m| (m.created_at, *m.id.as_uuid()));

        let total = matching.len() as u64;
        let movements: Vec<StockMovement> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        let has_more = total > (pagination.offset + pagination.limit) as u64;

        Ok(MovementPage {
            movements,
            total,
            pagination,
            has_more,
        })
    }
}
