//! Integration tests for the full stock pipeline.
//!
//! Tests: MovementDraft → StockService → StockStore → projection + ledger
//!
//! Verifies:
//! - The projection always equals the net sum of the committed ledger
//! - Rejected movements leave both halves untouched (atomicity)
//! - Concurrent writers on one product serialize correctly

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use stockledger_core::{ActorId, ProductId, StockError};
    use stockledger_stock::{MovementDirection, MovementDraft, ProductStock};

    use crate::service::StockService;
    use crate::stock_store::{InMemoryStockStore, MovementFilter, Pagination, StockStore};

    fn setup(initial_quantity: i64) -> (StockService<InMemoryStockStore>, ProductId) {
        stockledger_observability::init();

        let store = InMemoryStockStore::new();
        let product_id = ProductId::new();
        store
            .insert_product(ProductStock::new(product_id, initial_quantity))
            .unwrap();
        (StockService::new(store), product_id)
    }

    fn draft(product_id: ProductId, direction: MovementDirection, quantity: i64) -> MovementDraft {
        MovementDraft::new(product_id, direction, quantity)
    }

    #[test]
    fn record_movement_roundtrip() {
        let (service, product_id) = setup(10);

        let mut d = draft(product_id, MovementDirection::In, 5);
        d.unit_price = Some(1250);
        d.supplier = Some("Acme Supply".to_string());
        d.notes = Some("restock".to_string());
        d.actor = Some(ActorId::new("ana"));

        let receipt = service.record_movement(d).unwrap();
        assert_eq!(receipt.product.quantity, 15);
        assert_eq!(receipt.movement.product_id, product_id);
        assert_eq!(receipt.movement.quantity, 5);
        assert_eq!(receipt.movement.unit_price, Some(1250));
        assert_eq!(receipt.movement.supplier.as_deref(), Some("Acme Supply"));
        assert_eq!(receipt.movement.created_by.as_str(), "ana");

        // The persisted ledger row matches the receipt.
        let page = service
            .movements(product_id, &MovementFilter::default(), Pagination::default())
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.movements[0], receipt.movement);
    }

    #[test]
    fn inbound_then_oversized_out_then_exact_drain() {
        let (service, product_id) = setup(10);

        let receipt = service
            .record_movement(draft(product_id, MovementDirection::In, 5))
            .unwrap();
        assert_eq!(receipt.product.quantity, 15);

        let err = service
            .record_movement(draft(product_id, MovementDirection::Out, 20))
            .unwrap_err();
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

        let receipt = service
            .record_movement(draft(product_id, MovementDirection::Out, 15))
            .unwrap();
        assert_eq!(receipt.product.quantity, 0);
    }

    #[test]
    fn rejected_movement_leaves_projection_and_ledger_untouched() {
        let (service, product_id) = setup(0);

        service
            .record_movement(draft(product_id, MovementDirection::In, 8))
            .unwrap();
        service
            .record_movement(draft(product_id, MovementDirection::Out, 3))
            .unwrap();

        let before = service
            .movements(product_id, &MovementFilter::default(), Pagination::default())
            .unwrap();

        let err = service
            .record_movement(draft(product_id, MovementDirection::Out, 6))
            .unwrap_err();
        assert!(matches!(err, StockError::InsufficientStock { .. }));

        let after = service
            .movements(product_id, &MovementFilter::default(), Pagination::default())
            .unwrap();
        assert_eq!(before.total, after.total);
        assert_eq!(before.movements, after.movements);

        let report = service.reconcile(product_id).unwrap();
        assert_eq!(report.projected_quantity, 5);
        assert!(report.is_consistent());
    }

    #[test]
    fn malformed_input_never_touches_the_store() {
        let (service, product_id) = setup(10);

        let err = service
            .record_movement(draft(product_id, MovementDirection::Out, 0))
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidMovement(_)));

        let err = service
            .record_movement(draft(product_id, MovementDirection::In, -5))
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidMovement(_)));

        let page = service
            .movements(product_id, &MovementFilter::default(), Pagination::default())
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn unknown_product_is_rejected_on_record_and_list() {
        let (service, _) = setup(10);
        let missing = ProductId::new();

        let err = service
            .record_movement(draft(missing, MovementDirection::In, 1))
            .unwrap_err();
        assert!(matches!(err, StockError::ProductNotFound(id) if id == missing));

        let err = service
            .movements(missing, &MovementFilter::default(), Pagination::default())
            .unwrap_err();
        assert!(matches!(err, StockError::ProductNotFound(id) if id == missing));
    }

    #[test]
    fn unattributed_movements_are_recorded_as_system() {
        let (service, product_id) = setup(0);

        let receipt = service
            .record_movement(draft(product_id, MovementDirection::In, 4))
            .unwrap();
        assert!(receipt.movement.created_by.is_system());
    }

    #[test]
    fn projection_equals_net_sum_after_mixed_sequence() {
        let (service, product_id) = setup(0);

        let sequence = [
            (MovementDirection::In, 100),
            (MovementDirection::In, 20),
            (MovementDirection::Out, 50),
            (MovementDirection::Out, 70),
            (MovementDirection::In, 1),
            (MovementDirection::Out, 1),
        ];
        for (direction, quantity) in sequence {
            service
                .record_movement(draft(product_id, direction, quantity))
                .unwrap();
        }

        let report = service.reconcile(product_id).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.movement_count, 6);
        assert_eq!(report.projected_quantity, 0);
        assert_eq!(report.derived_quantity, 0);
    }

    #[test]
    fn seeded_snapshot_reports_its_seed_as_constant_drift() {
        let (service, product_id) = setup(10);

        service
            .record_movement(draft(product_id, MovementDirection::Out, 4))
            .unwrap();

        let report = service.reconcile(product_id).unwrap();
        assert_eq!(report.projected_quantity, 6);
        assert_eq!(report.derived_quantity, -4);
        assert_eq!(report.projected_quantity - report.derived_quantity, 10);
    }

    #[test]
    fn ledger_custody_product_reconciles_exactly() {
        let (service, product_id) = setup(0);

        for (direction, quantity) in [
            (MovementDirection::In, 30),
            (MovementDirection::Out, 12),
            (MovementDirection::In, 7),
        ] {
            service
                .record_movement(draft(product_id, direction, quantity))
                .unwrap();
        }

        let report = service.reconcile(product_id).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.derived_quantity, 25);
        assert_eq!(report.movement_count, 3);
    }

    #[test]
    fn reconcile_detects_external_projection_drift() {
        let store = Arc::new(InMemoryStockStore::new());
        let product_id = ProductId::new();
        store
            .insert_product(ProductStock::new(product_id, 0))
            .unwrap();
        let service = StockService::new(store.clone());

        service
            .record_movement(draft(product_id, MovementDirection::In, 10))
            .unwrap();

        // Simulate corruption by a writer outside the core.
        store
            .insert_product(ProductStock {
                product_id,
                quantity: 99,
                version: 1,
            })
            .unwrap();

        let report = service.reconcile(product_id).unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.projected_quantity, 99);
        assert_eq!(report.derived_quantity, 10);
    }

    #[test]
    fn concurrent_out_movements_serialize_per_product() {
        const STARTING_STOCK: i64 = 10;
        const OUT_QUANTITY: i64 = 3;
        const WRITERS: usize = 8;

        let store = InMemoryStockStore::new();
        let product_id = ProductId::new();
        store
            .insert_product(ProductStock::new(product_id, STARTING_STOCK))
            .unwrap();
        let service = Arc::new(StockService::new(store));

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let service = service.clone();
                thread::spawn(move || {
                    let mut d = draft(product_id, MovementDirection::Out, OUT_QUANTITY);
                    d.actor = Some(ActorId::new(format!("writer-{i}")));
                    service.record_movement(d)
                })
            })
            .collect();

        let mut successes = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => successes += 1,
                Err(StockError::InsufficientStock { .. }) => insufficient += 1,
                Err(other) => panic!("unexpected outcome: {other:?}"),
            }
        }

        let expected_successes = (STARTING_STOCK / OUT_QUANTITY) as usize;
        assert_eq!(successes, expected_successes);
        assert_eq!(insufficient, WRITERS - expected_successes);

        let report = service.reconcile(product_id).unwrap();
        assert!(report.is_consistent());
        assert_eq!(
            report.projected_quantity,
            STARTING_STOCK - OUT_QUANTITY * expected_successes as i64
        );
        assert_eq!(report.movement_count, expected_successes as u64);
    }

    #[test]
    fn writers_on_different_products_do_not_interfere() {
        let store = InMemoryStockStore::new();
        let product_a = ProductId::new();
        let product_b = ProductId::new();
        store.insert_product(ProductStock::new(product_a, 0)).unwrap();
        store.insert_product(ProductStock::new(product_b, 0)).unwrap();
        let service = Arc::new(StockService::new(store));

        let handles: Vec<_> = [product_a, product_b]
            .into_iter()
            .flat_map(|pid| {
                (0..4).map(move |_| pid).collect::<Vec<_>>()
            })
            .map(|pid| {
                let service = service.clone();
                thread::spawn(move || {
                    service
                        .record_movement(draft(pid, MovementDirection::In, 5))
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for pid in [product_a, product_b] {
            let report = service.reconcile(pid).unwrap();
            assert!(report.is_consistent());
            assert_eq!(report.projected_quantity, 20);
            assert_eq!(report.movement_count, 4);
        }
    }
}
