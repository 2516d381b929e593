//! Valuation engine: the only writer of snapshot stock and average cost.
//!
//! Every stock-mutating operation appends movements and then calls
//! [`ValuationEngine::recompute`], which replays the product's full movement
//! stream through the valuation fold and overwrites the snapshot with the
//! result. The snapshot never accumulates deltas incrementally, so it can
//! always be repaired by re-running the fold.

use bodega_catalog::ProductId;
use bodega_core::TenantId;
use bodega_ledger::{history, valuate, LedgerEntry, Valuation};
use chrono::Utc;
use tracing::instrument;

use crate::movement_store::{MovementStore, MovementStoreError, StoredMovement};
use crate::snapshot::SnapshotStore;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown product {product_id}")]
    UnknownProduct { product_id: ProductId },

    #[error(transparent)]
    Store(#[from] MovementStoreError),
}

/// Replays movement streams into product snapshots.
#[derive(Debug, Clone)]
pub struct ValuationEngine<M, S> {
    movements: M,
    snapshots: S,
}

impl<M, S> ValuationEngine<M, S>
where
    M: MovementStore,
    S: SnapshotStore,
{
    pub fn new(movements: M, snapshots: S) -> Self {
        Self { movements, snapshots }
    }

    /// Recompute stock and average cost for one product from its full
    /// movement stream and persist the result to the snapshot.
    #[instrument(skip(self), fields(%tenant_id, %product_id))]
    pub fn recompute(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Valuation, EngineError> {
        let mut snapshot = self
            .snapshots
            .get(tenant_id, &product_id)
            .ok_or(EngineError::UnknownProduct { product_id })?;

        let stored = self.movements.load_for_product(tenant_id, product_id)?;
        let valuation = valuate(stored.iter().map(|s| &s.movement), snapshot.unit_kind);

        snapshot.apply_valuation(valuation, Utc::now());
        self.snapshots.upsert(tenant_id, snapshot);
        Ok(valuation)
    }

    /// The product's ordered movement history with running balances.
    pub fn history(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Vec<LedgerEntry>, EngineError> {
        let snapshot = self
            .snapshots
            .get(tenant_id, &product_id)
            .ok_or(EngineError::UnknownProduct { product_id })?;

        let stored = self.movements.load_for_product(tenant_id, product_id)?;
        Ok(history(
            stored.iter().map(|s| &s.movement),
            snapshot.unit_kind,
        ))
    }

    /// Raw stored movements, in replay order.
    pub fn movements(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Vec<StoredMovement>, EngineError> {
        Ok(self.movements.load_for_product(tenant_id, product_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement_store::InMemoryMovementStore;
    use crate::snapshot::{InMemorySnapshotStore, ProductSnapshot, SnapshotStore as _};
    use bodega_catalog::{CategoryConfig, Product, UnitKind};
    use bodega_core::{AggregateId, ExpectedVersion, UserId};
    use bodega_ledger::Movement;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn seeded_product(config: &CategoryConfig) -> Product {
        Product::new(
            ProductId::new(AggregateId::new()),
            "Arroz Costeño 5kg",
            "Abarrotes",
            Some("Arroz".to_string()),
            UnitKind::Discrete,
            dec!(5),
            dec!(24.50),
            config,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn recompute_overwrites_a_drifted_snapshot() {
        let movements = Arc::new(InMemoryMovementStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let engine = ValuationEngine::new(movements.clone(), snapshots.clone());

        let config = CategoryConfig::standard_grocery();
        let tenant_id = TenantId::new();
        let product = seeded_product(&config);
        let product_id = product.id;
        snapshots.upsert(tenant_id, ProductSnapshot::from_product(&product));

        let actor = UserId::new();
        movements
            .append(
                vec![Movement::inbound_receipt(
                    tenant_id,
                    product_id,
                    UnitKind::Discrete,
                    dec!(10),
                    dec!(18.00),
                    actor,
                    Utc::now(),
                )
                .unwrap()],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        // Simulate drift: scribble over the cached figures.
        let mut drifted = snapshots.get(tenant_id, &product_id).unwrap();
        drifted.stock = dec!(999);
        drifted.average_cost = dec!(1.23);
        snapshots.upsert(tenant_id, drifted);

        let valuation = engine.recompute(tenant_id, product_id).unwrap();
        assert_eq!(valuation.stock, dec!(10));
        assert_eq!(valuation.average_cost, dec!(18.00));

        let repaired = snapshots.get(tenant_id, &product_id).unwrap();
        assert_eq!(repaired.stock, dec!(10));
        assert_eq!(repaired.average_cost, dec!(18.00));
    }

    #[test]
    fn recompute_is_idempotent() {
        let movements = Arc::new(InMemoryMovementStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let engine = ValuationEngine::new(movements.clone(), snapshots.clone());

        let config = CategoryConfig::standard_grocery();
        let tenant_id = TenantId::new();
        let product = seeded_product(&config);
        let product_id = product.id;
        snapshots.upsert(tenant_id, ProductSnapshot::from_product(&product));

        let actor = UserId::new();
        movements
            .append(
                vec![
                    Movement::inbound_receipt(
                        tenant_id,
                        product_id,
                        UnitKind::Discrete,
                        dec!(7),
                        dec!(3.40),
                        actor,
                        Utc::now(),
                    )
                    .unwrap(),
                    Movement::sale_debit(
                        tenant_id,
                        product_id,
                        UnitKind::Discrete,
                        dec!(2),
                        actor,
                        Utc::now(),
                    )
                    .unwrap(),
                ],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let first = engine.recompute(tenant_id, product_id).unwrap();
        let second = engine.recompute(tenant_id, product_id).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.stock, dec!(5));
    }

    #[test]
    fn recompute_rejects_unknown_products() {
        let engine = ValuationEngine::new(
            Arc::new(InMemoryMovementStore::new()),
            Arc::new(InMemorySnapshotStore::new()),
        );
        let err = engine
            .recompute(TenantId::new(), ProductId::new(AggregateId::new()))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownProduct { .. }));
    }

    #[test]
    fn history_attaches_running_balances() {
        let movements = Arc::new(InMemoryMovementStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let engine = ValuationEngine::new(movements.clone(), snapshots.clone());

        let config = CategoryConfig::standard_grocery();
        let tenant_id = TenantId::new();
        let product = seeded_product(&config);
        let product_id = product.id;
        snapshots.upsert(tenant_id, ProductSnapshot::from_product(&product));

        let actor = UserId::new();
        movements
            .append(
                vec![
                    Movement::inbound_receipt(
                        tenant_id,
                        product_id,
                        UnitKind::Discrete,
                        dec!(12),
                        dec!(18.00),
                        actor,
                        Utc::now(),
                    )
                    .unwrap(),
                    Movement::sale_debit(
                        tenant_id,
                        product_id,
                        UnitKind::Discrete,
                        dec!(4),
                        actor,
                        Utc::now(),
                    )
                    .unwrap(),
                ],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let entries = engine.history(tenant_id, product_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].opening_stock, dec!(0));
        assert_eq!(entries[0].closing_stock, dec!(12));
        assert_eq!(entries[1].opening_stock, dec!(12));
        assert_eq!(entries[1].closing_stock, dec!(8));
    }
}
