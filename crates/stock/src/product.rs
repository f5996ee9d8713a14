use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, StockError, StockResult};

use crate::movement::MovementDirection;

/// Current-quantity projection snapshot for one product.
///
/// The quantity is derived state: it always equals the net sum of the
/// product's committed movement history. `version` backs compare-and-set
/// writes and is infrastructure metadata, not business state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: ProductId,
    pub quantity: i64,
    pub version: u64,
}

impl ProductStock {
    /// Snapshot for a product entering the ledger's custody.
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
            version: 0,
        }
    }

    /// The snapshot as it will read after committing `quantity`.
    pub fn with_quantity(&self, quantity: i64) -> Self {
        Self {
            product_id: self.product_id,
            quantity,
            version: self.version + 1,
        }
    }

    /// Whether on-hand stock is at or below the catalog's minimum threshold.
    pub fn is_low_stock(&self, min_stock: i64) -> bool {
        self.quantity <= min_stock
    }
}

/// Compute the candidate quantity for a movement against the current stock.
///
/// Errors with [`StockError::InsufficientStock`] when an OUT movement would
/// drive the projection below zero; the caller must not mutate any state on
/// that path. Quantity positivity is the draft's concern and is assumed here.
pub fn next_quantity(
    current: i64,
    direction: MovementDirection,
    quantity: i64,
) -> StockResult<i64> {
    let candidate = current + direction.sign() * quantity;
    if candidate < 0 {
        return Err(StockError::insufficient_stock(current, quantity));
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_movement_increases_quantity() {
        assert_eq!(next_quantity(10, MovementDirection::In, 5).unwrap(), 15);
    }

    #[test]
    fn outbound_movement_decreases_quantity() {
        assert_eq!(next_quantity(15, MovementDirection::Out, 15).unwrap(), 0);
    }

    #[test]
    fn outbound_below_zero_is_rejected_with_available_quantity() {
        let err = next_quantity(15, MovementDirection::Out, 20).unwrap_err();
        match err {
            StockError::InsufficientStock {
                available,
                requested,
            } => {
                assert_eq!(available, 15);
                assert_eq!(requested, 20);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn with_quantity_advances_version() {
        let stock = ProductStock::new(ProductId::new(), 10);
        let updated = stock.with_quantity(15);
        assert_eq!(updated.quantity, 15);
        assert_eq!(updated.version, 1);
        assert_eq!(updated.product_id, stock.product_id);
    }

    #[test]
    fn low_stock_threshold_is_inclusive() {
        let stock = ProductStock::new(ProductId::new(), 5);
        assert!(stock.is_low_stock(5));
        assert!(stock.is_low_stock(10));
        assert!(!stock.is_low_stock(4));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_direction() -> impl Strategy<Value = MovementDirection> {
            prop_oneof![
                Just(MovementDirection::In),
                Just(MovementDirection::Out),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: over any sequence of movements, the accepted ones
            /// net-sum to the final quantity and the projection never goes
            /// negative.
            #[test]
            fn accepted_movements_net_sum_to_quantity(
                start in 0i64..10_000,
                moves in prop::collection::vec((arb_direction(), 1i64..1_000), 0..64)
            ) {
                let mut quantity = start;
                let mut net = 0i64;

                for (direction, qty) in moves {
                    match next_quantity(quantity, direction, qty) {
                        Ok(candidate) => {
                            quantity = candidate;
                            net += direction.sign() * qty;
                        }
                        Err(StockError::InsufficientStock { available, requested }) => {
                            // Rejection leaves the projection untouched and is
                            // only ever the below-zero case.
                            prop_assert_eq!(available, quantity);
                            prop_assert_eq!(requested, qty);
                            prop_assert!(quantity - qty < 0);
                        }
                        Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
                    }

                    prop_assert!(quantity >= 0);
                }

                prop_assert_eq!(quantity, start + net);
            }

            /// Property: an IN movement always succeeds and an OUT movement
            /// succeeds exactly when enough stock is on hand.
            #[test]
            fn out_succeeds_iff_stock_suffices(
                current in 0i64..10_000,
                qty in 1i64..10_000
            ) {
                prop_assert_eq!(
                    next_quantity(current, MovementDirection::In, qty).unwrap(),
                    current + qty
                );

                let out = next_quantity(current, MovementDirection::Out, qty);
                if qty <= current {
                    prop_assert_eq!(out.unwrap(), current - qty);
                } else {
                    prop_assert!(
                        matches!(out, Err(StockError::InsufficientStock { .. })),
                        "expected InsufficientStock error"
                    );
                }
            }
        }
    }
}
