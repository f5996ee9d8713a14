//! Postgres-backed stock store implementation.
//!
//! Persists the movement ledger and the quantity projection in PostgreSQL,
//! enforcing the dual-write atomicity contract with a transaction per commit
//! and optimistic concurrency against the product row's `version` column.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE products (
//!     id       uuid PRIMARY KEY,
//!     quantity bigint NOT NULL CHECK (quantity >= 0),
//!     version  bigint NOT NULL DEFAULT 0
//! );
//!
//! CREATE TABLE stock_movements (
//!     id         uuid PRIMARY KEY,
//!     product_id uuid NOT NULL REFERENCES products (id),
//!     direction  text NOT NULL CHECK (direction IN ('IN', 'OUT')),
//!     quantity   bigint NOT NULL CHECK (quantity > 0),
//!     unit_price bigint,
//!     supplier   text,
//!     notes      text,
//!     created_by text NOT NULL,
//!     created_at timestamptz NOT NULL
//! );
//!
//! CREATE INDEX stock_movements_product_created_idx
//!     ON stock_movements (product_id, created_at);
//! ```
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StockStoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StockStoreError | Scenario |
//! |------------|----------------------|-----------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent commit detected |
//! | Database (foreign key violation) | `23503` | `Storage` | Movement references a deleted product |
//! | Database (check constraint violation) | `23514` | `Storage` | Invalid data reached the database |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / RowNotFound / Other | N/A | `Storage` | Pool closed, network failures, etc. |
//!
//! ## Thread Safety
//!
//! `PostgresStockStore` is `Send + Sync` and can be shared across threads.
//! All operations use the SQLx connection pool which handles thread-safe
//! connection management.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use stockledger_core::{ActorId, ExpectedVersion, MovementId, ProductId};
use stockledger_stock::{MovementDirection, ProductStock, StockMovement};

use super::query::{MovementFilter, MovementPage, Pagination};
use super::r#trait::{StockStore, StockStoreError};

/// Postgres-backed ledger + projection store.
///
/// ## Optimistic Concurrency
///
/// `commit_movement` runs one transaction:
/// 1. `SELECT ... FOR UPDATE` the product row (missing row fails the commit)
/// 2. Validate the row `version` against the caller's expectation
/// 3. `UPDATE` the quantity and bump the version
/// 4. `INSERT` the movement
///
/// A writer that lost the race observes a different version in step 2 and
/// gets `Conflict`; nothing it wrote survives the rollback.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    /// Create a new PostgresStockStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn load_product_async(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ProductStock>, StockStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, quantity, version
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_product", e))?;

        match row {
            Some(row) => {
                let product = ProductRow::from_row(&row).map_err(|e| {
                    StockStoreError::Storage(format!("failed to deserialize product row: {e}"))
                })?;
                Ok(Some(product.into()))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, product), fields(product_id = %product.product_id), err)]
    pub async fn insert_product_async(
        &self,
        product: ProductStock,
    ) -> Result<(), StockStoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, quantity, version)
            VALUES ($1, $2, $3)
            ON CONFLICT (id)
            DO UPDATE SET
                quantity = EXCLUDED.quantity,
                version = EXCLUDED.version
            "#,
        )
        .bind(product.product_id.as_uuid())
        .bind(product.quantity)
        .bind(product.version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        Ok(())
    }

    /// Append a movement and set the projection quantity, atomically.
    #[instrument(
        skip(self, movement),
        fields(
            product_id = %movement.product_id,
            movement_id = %movement.id,
            expected = ?expected,
            new_quantity
        ),
        err
    )]
    pub async fn commit_movement_async(
        &self,
        movement: StockMovement,
        expected: ExpectedVersion,
        new_quantity: i64,
    ) -> Result<StockMovement, StockStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Lock the product row for the duration of the commit.
        let row = sqlx::query(
            r#"
            SELECT version
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(movement.product_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StockStoreError::ProductMissing(movement.product_id));
        };

        let current_version: i64 = row
            .try_get("version")
            .map_err(|e| StockStoreError::Storage(format!("failed to read version: {e}")))?;

        if !expected.matches(current_version as u64) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StockStoreError::Conflict(format!(
                "expected {expected:?}, found {current_version}"
            )));
        }

        sqlx::query(
            r#"
            UPDATE products
            SET quantity = $2, version = version + 1
            WHERE id = $1
            "#,
        )
        .bind(movement.product_id.as_uuid())
        .bind(new_quantity)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_projection", e))?;

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id,
                product_id,
                direction,
                quantity,
                unit_price,
                supplier,
                notes,
                created_by,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.direction.as_str())
        .bind(movement.quantity)
        .bind(movement.unit_price.map(|p| p as i64))
        .bind(movement.supplier.as_deref())
        .bind(movement.notes.as_deref())
        .bind(movement.created_by.as_str())
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(movement)
    }

    #[instrument(skip(self, filter), fields(product_id = %product_id), err)]
    pub async fn movements_by_product_async(
        &self,
        product_id: ProductId,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StockStoreError> {
        let direction_param: Option<&str> = filter.direction.map(|d| d.as_str());

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) as total
            FROM stock_movements
            WHERE product_id = $1
                AND ($2::text IS NULL OR direction = $2)
                AND ($3::timestamptz IS NULL OR created_at >= $3)
                AND ($4::timestamptz IS NULL OR created_at <= $4)
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(direction_param)
        .bind(filter.created_after)
        .bind(filter.created_before)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_movements", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StockStoreError::Storage(format!("failed to read count: {e}")))?;

        let rows = sqlx::query(
            r#"
            SELECT
                id,
                product_id,
                direction,
                quantity,
                unit_price,
                supplier,
                notes,
                created_by,
                created_at
            FROM stock_movements
            WHERE product_id = $1
                AND ($2::text IS NULL OR direction = $2)
                AND ($3::timestamptz IS NULL OR created_at >= $3)
                AND ($4::timestamptz IS NULL OR created_at <= $4)
            ORDER BY created_at ASC, id ASC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(direction_param)
        .bind(filter.created_after)
        .bind(filter.created_before)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_movements", e))?;

        let mut movements = Vec::with_capacity(rows.len());
        for row in rows {
            let movement = StockMovementRow::from_row(&row).map_err(|e| {
                StockStoreError::Storage(format!("failed to deserialize movement row: {e}"))
            })?;
            movements.push(movement.try_into()?);
        }

        let has_more = total > (pagination.offset + pagination.limit) as i64;

        Ok(MovementPage {
            movements,
            total: total as u64,
            pagination,
            has_more,
        })
    }
}

/// Map SQLx errors to StockStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StockStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                // Unique violation: another transaction committed concurrently.
                Some("23505") => StockStoreError::Conflict(msg),
                _ => StockStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StockStoreError::Storage(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            StockStoreError::Storage(format!("unexpected row not found in {operation}"))
        }
        _ => StockStoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    quantity: i64,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            quantity: row.try_get("quantity")?,
            version: row.try_get("version")?,
        })
    }
}

impl From<ProductRow> for ProductStock {
    fn from(row: ProductRow) -> Self {
        ProductStock {
            product_id: ProductId::from_uuid(row.id),
            quantity: row.quantity,
            version: row.version as u64,
        }
    }
}

#[derive(Debug)]
struct StockMovementRow {
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    direction: String,
    quantity: i64,
    unit_price: Option<i64>,
    supplier: Option<String>,
    notes: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StockMovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockMovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            direction: row.try_get("direction")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            supplier: row.try_get("supplier")?,
            notes: row.try_get("notes")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<StockMovementRow> for StockMovement {
    type Error = StockStoreError;

    fn try_from(row: StockMovementRow) -> Result<Self, Self::Error> {
        let direction: MovementDirection = row
            .direction
            .parse()
            .map_err(|e| StockStoreError::Storage(format!("invalid direction in row: {e}")))?;

        let unit_price = row
            .unit_price
            .map(u64::try_from)
            .transpose()
            .map_err(|_| {
                StockStoreError::Storage("negative unit_price in movement row".to_string())
            })?;

        Ok(StockMovement {
            id: MovementId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            direction,
            quantity: row.quantity,
            unit_price,
            supplier: row.supplier,
            notes: row.notes,
            created_by: ActorId::new(row.created_by),
            created_at: row.created_at,
        })
    }
}

// Implement the sync StockStore trait.
//
// The trait is synchronous, but Postgres operations require async. We use
// tokio::runtime::Handle to run async code in a sync context; this works when
// called from within a tokio runtime.

fn runtime_handle(operation: &str) -> Result<tokio::runtime::Handle, StockStoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        StockStoreError::Storage(format!(
            "PostgresStockStore::{operation} requires an ambient tokio runtime"
        ))
    })
}

impl StockStore for PostgresStockStore {
    fn load_product(&self, product_id: ProductId) -> Result<Option<ProductStock>, StockStoreError> {
        runtime_handle("load_product")?.block_on(self.load_product_async(product_id))
    }

    fn insert_product(&self, product: ProductStock) -> Result<(), StockStoreError> {
        runtime_handle("insert_product")?.block_on(self.insert_product_async(product))
    }

    fn commit_movement(
        &self,
        movement: StockMovement,
        expected: ExpectedVersion,
        new_quantity: i64,
    ) -> Result<StockMovement, StockStoreError> {
        runtime_handle("commit_movement")?
            .block_on(self.commit_movement_async(movement, expected, new_quantity))
    }

    fn movements_by_product(
        &self,
        product_id: ProductId,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StockStoreError> {
        runtime_handle("movements_by_product")?
            .block_on(self.movements_by_product_async(product_id, filter, pagination))
    }
}
