use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ActorId, MovementId, ProductId, StockError, StockResult};

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementDirection {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::In => "IN",
            MovementDirection::Out => "OUT",
        }
    }

    /// Signed contribution of one unit to the quantity projection.
    pub fn sign(&self) -> i64 {
        match self {
            MovementDirection::In => 1,
            MovementDirection::Out => -1,
        }
    }
}

impl core::fmt::Display for MovementDirection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementDirection {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(MovementDirection::In),
            "OUT" => Ok(MovementDirection::Out),
            other => Err(StockError::invalid_movement(format!(
                "unknown direction '{other}' (expected IN or OUT)"
            ))),
        }
    }
}

/// A movement request that has not been committed yet.
///
/// `unit_price` is expressed in the smallest currency unit (e.g. cents) and
/// is informational only; it never enters quantity math. `actor` is optional:
/// unattributed requests are committed as [`ActorId::system`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDraft {
    pub product_id: ProductId,
    pub direction: MovementDirection,
    pub quantity: i64,
    pub unit_price: Option<u64>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub actor: Option<ActorId>,
}

impl MovementDraft {
    pub fn new(product_id: ProductId, direction: MovementDirection, quantity: i64) -> Self {
        Self {
            product_id,
            direction,
            quantity,
            unit_price: None,
            supplier: None,
            notes: None,
            actor: None,
        }
    }

    /// Validate input constraints. Runs before any product read: malformed
    /// input never touches the projection.
    pub fn validate(&self) -> StockResult<()> {
        if self.quantity <= 0 {
            return Err(StockError::invalid_movement(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        Ok(())
    }

    /// Stamp the draft into a committed movement fact.
    ///
    /// The identifier and timestamp are assigned exactly once, at commit time.
    pub fn into_movement(self, id: MovementId, created_at: DateTime<Utc>) -> StockMovement {
        StockMovement {
            id,
            product_id: self.product_id,
            direction: self.direction,
            quantity: self.quantity,
            unit_price: self.unit_price,
            supplier: self.supplier,
            notes: self.notes,
            created_by: self.actor.unwrap_or_else(ActorId::system),
            created_at,
        }
    }
}

/// A committed stock movement.
///
/// Immutable once persisted: the ledger is append-only, movements are never
/// updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub direction: MovementDirection,
    pub quantity: i64,
    pub unit_price: Option<u64>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Net contribution of this movement to the quantity projection.
    pub fn signed_quantity(&self) -> i64 {
        self.direction.sign() * self.quantity
    }
}
