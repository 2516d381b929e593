//! Ledger service: product registration and movement appends.
//!
//! All writes for one product run under that product's lock (see
//! [`ProductLocks`]) and finish with a full snapshot recompute, so a
//! snapshot read immediately after any of these calls reflects the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

use bodega_auth::{Privilege, PrivilegeGrant, validate_grant};
use bodega_catalog::{Product, ProductId};
use bodega_core::{DomainError, ExpectedVersion, TenantId, UserId};
use bodega_ledger::{LedgerEntry, Movement, valuate};

use crate::engine::{EngineError, ValuationEngine};
use crate::locks::ProductLocks;
use crate::movement_store::{MovementStore, MovementStoreError, StoredMovement};
use crate::snapshot::{ProductSnapshot, SnapshotStore};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] MovementStoreError),

    #[error("unknown product {product_id}")]
    UnknownProduct { product_id: ProductId },
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownProduct { product_id } => Self::UnknownProduct { product_id },
            EngineError::Store(e) => Self::Store(e),
        }
    }
}

/// Opening stock received together with a product registration. Every
/// product starts life with one opening inbound movement; later stock only
/// ever changes through further movements.
#[derive(Debug, Clone, Copy)]
pub struct OpeningStock {
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

/// A movement to append through the service.
///
/// Sale debits are deliberately absent: they are only ever written by the
/// checkout commit, which debits all lines of a sale atomically.
#[derive(Debug, Clone)]
pub enum NewMovement {
    InboundReceipt { quantity: Decimal, unit_cost: Decimal },
    ManualAdjustment { delta: Decimal, reason: String },
}

/// Registration and stock-movement front door for one pair of stores.
#[derive(Debug, Clone)]
pub struct LedgerService<M, S> {
    movements: M,
    snapshots: S,
    engine: ValuationEngine<M, S>,
    locks: ProductLocks,
}

impl<M, S> LedgerService<M, S>
where
    M: MovementStore + Clone,
    S: SnapshotStore + Clone,
{
    pub fn new(movements: M, snapshots: S, locks: ProductLocks) -> Self {
        let engine = ValuationEngine::new(movements.clone(), snapshots.clone());
        Self { movements, snapshots, engine, locks }
    }

    /// Register a product together with its opening inbound movement.
    ///
    /// The opening stock is recorded as an ordinary inbound receipt at
    /// sequence 1 of the product's stream, so the opening quantity and cost
    /// flow through the same valuation fold as everything after them.
    pub fn register_product(
        &self,
        tenant_id: TenantId,
        product: Product,
        opening: OpeningStock,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<ProductSnapshot, ServiceError> {
        let product_id = product.id;
        let opening_movement = Movement::inbound_receipt(
            tenant_id,
            product_id,
            product.unit_kind,
            opening.quantity,
            opening.unit_cost,
            actor,
            now,
        )?;

        let handle = self.locks.handle(tenant_id, product_id);
        let _guard = handle.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if self.snapshots.get(tenant_id, &product_id).is_some() {
            return Err(DomainError::conflict(format!(
                "product {product_id} is already registered"
            ))
            .into());
        }

        self.snapshots
            .upsert(tenant_id, ProductSnapshot::from_product(&product));
        self.movements
            .append(vec![opening_movement], ExpectedVersion::Exact(0))?;
        self.engine.recompute(tenant_id, product_id)?;

        info!(%tenant_id, %product_id, name = %product.name, "registered product");
        self.snapshot(tenant_id, product_id)
    }

    /// Append one inbound receipt or manual adjustment and recompute the
    /// snapshot. Manual adjustments require a valid [`PrivilegeGrant`] for
    /// [`Privilege::AdjustStock`] and are rejected when the resulting stock
    /// would be negative.
    pub fn append_movement(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        new_movement: NewMovement,
        grant: Option<&PrivilegeGrant>,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<StoredMovement, ServiceError> {
        let handle = self.locks.handle(tenant_id, product_id);
        let _guard = handle.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let snapshot = self
            .snapshots
            .get(tenant_id, &product_id)
            .ok_or(ServiceError::UnknownProduct { product_id })?;

        let movement = match new_movement {
            NewMovement::InboundReceipt { quantity, unit_cost } => Movement::inbound_receipt(
                tenant_id,
                product_id,
                snapshot.unit_kind,
                quantity,
                unit_cost,
                actor,
                now,
            )?,
            NewMovement::ManualAdjustment { delta, reason } => {
                let grant = grant.ok_or(DomainError::Unauthorized)?;
                if validate_grant(grant, tenant_id, Privilege::AdjustStock, now).is_err() {
                    return Err(DomainError::Unauthorized.into());
                }

                let movement = Movement::manual_adjustment(
                    tenant_id,
                    product_id,
                    snapshot.unit_kind,
                    delta,
                    reason,
                    actor,
                    now,
                )?;

                // Adjustments may be negative; the resulting stock must not be.
                let stored = self.movements.load_for_product(tenant_id, product_id)?;
                let current = valuate(stored.iter().map(|s| &s.movement), snapshot.unit_kind);
                if current.stock + delta < Decimal::ZERO {
                    return Err(DomainError::invariant(format!(
                        "adjustment of {delta} would drive stock of {product_id} below zero"
                    ))
                    .into());
                }
                movement
            }
        };

        let version = self.movements.stream_version(tenant_id, product_id)?;
        let mut stored = self
            .movements
            .append(vec![movement], ExpectedVersion::Exact(version))?;
        self.engine.recompute(tenant_id, product_id)?;

        let stored = stored.pop().ok_or_else(|| {
            MovementStoreError::Persistence("append returned no stored movement".into())
        })?;
        info!(
            %tenant_id,
            %product_id,
            kind = ?stored.movement.kind,
            delta = %stored.movement.quantity_delta,
            "appended movement"
        );
        Ok(stored)
    }

    /// Current snapshot of one product.
    pub fn snapshot(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<ProductSnapshot, ServiceError> {
        self.snapshots
            .get(tenant_id, &product_id)
            .ok_or(ServiceError::UnknownProduct { product_id })
    }

    /// All product snapshots for a tenant.
    pub fn list_products(&self, tenant_id: TenantId) -> Vec<ProductSnapshot> {
        self.snapshots.list(tenant_id)
    }

    /// Products at or below their alert threshold.
    pub fn low_stock(&self, tenant_id: TenantId) -> Vec<ProductSnapshot> {
        self.snapshots.list_below_min(tenant_id)
    }

    /// Ordered movement history with running balances.
    pub fn history(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Vec<LedgerEntry>, ServiceError> {
        Ok(self.engine.history(tenant_id, product_id)?)
    }

    /// Raw stored movements, in replay order.
    pub fn movements(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Vec<StoredMovement>, ServiceError> {
        Ok(self.engine.movements(tenant_id, product_id)?)
    }
}
