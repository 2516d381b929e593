//! Sale checkout: price a cart, verify stock, debit the ledger atomically.
//!
//! A sale moves through Draft (caller assembles lines) → Validating (pricing
//! and stock checks, under the product locks) → Committed (debits appended,
//! snapshots recomputed, receipt issued) or Rejected (nothing appended). A
//! rejected sale leaves no trace in the ledger; a committed sale is
//! remembered under its `SaleId` so a retry after an ambiguous failure
//! returns the original receipt instead of debiting twice.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use bodega_catalog::ProductId;
use bodega_core::{AggregateId, DomainError, ExpectedVersion, TenantId, UserId};
use bodega_ledger::{Movement, valuate};
use bodega_pricing::{CartLine, CartTotals, aggregate_cart};

use crate::engine::ValuationEngine;
use crate::locks::ProductLocks;
use crate::movement_store::{MovementStore, MovementStoreError, StoredMovement};
use crate::receipt::{ReceiptNumber, ReceiptSequence};
use crate::snapshot::SnapshotStore;

/// Sale identifier, chosen by the caller so a retry can reuse it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One requested sale line: a product and how much of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
}

/// The durable outcome of a committed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub sale_id: SaleId,
    pub receipt_number: ReceiptNumber,
    /// Presentation totals, rounded to 2 decimals half-even.
    pub totals: CartTotals,
    pub movements: Vec<StoredMovement>,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("unknown product {product_id}")]
    UnknownProduct { product_id: ProductId },

    /// At least one line requested more than the ledger holds. The whole
    /// sale is rejected; every offending product is reported.
    #[error("insufficient stock for {} product(s)", product_ids.len())]
    InsufficientStock { product_ids: Vec<ProductId> },

    /// The stream version moved between check and append.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error(transparent)]
    Store(MovementStoreError),
}

impl From<MovementStoreError> for CheckoutError {
    fn from(err: MovementStoreError) -> Self {
        match err {
            MovementStoreError::Conflict(_) => Self::Concurrency(err.to_string()),
            other => Self::Store(other),
        }
    }
}

impl From<crate::engine::EngineError> for CheckoutError {
    fn from(err: crate::engine::EngineError) -> Self {
        match err {
            crate::engine::EngineError::UnknownProduct { product_id } => {
                Self::UnknownProduct { product_id }
            }
            crate::engine::EngineError::Store(e) => Self::from(e),
        }
    }
}

/// Prices carts and commits sales against a movement/snapshot store pair.
///
/// Shares its [`ProductLocks`] with the [`LedgerService`](crate::LedgerService)
/// over the same stores so sales and stock movements serialize against each
/// other per product.
#[derive(Debug)]
pub struct CheckoutService<M, S, R> {
    movements: M,
    snapshots: S,
    engine: ValuationEngine<M, S>,
    receipts: R,
    locks: ProductLocks,
    committed: RwLock<HashMap<(TenantId, SaleId), Receipt>>,
}

impl<M, S, R> CheckoutService<M, S, R>
where
    M: MovementStore + Clone,
    S: SnapshotStore + Clone,
    R: ReceiptSequence,
{
    pub fn new(movements: M, snapshots: S, receipts: R, locks: ProductLocks) -> Self {
        let engine = ValuationEngine::new(movements.clone(), snapshots.clone());
        Self {
            movements,
            snapshots,
            engine,
            receipts,
            locks,
            committed: RwLock::new(HashMap::new()),
        }
    }

    /// Commit a sale: price the cart, verify stock for every line under the
    /// product locks, append one sale debit per line, recompute the affected
    /// snapshots and issue a receipt.
    ///
    /// Idempotent per `(tenant_id, sale_id)`: re-submitting a committed sale
    /// returns the original receipt without touching the ledger.
    pub fn commit_sale(
        &self,
        tenant_id: TenantId,
        sale_id: SaleId,
        lines: &[SaleLine],
        discount: Decimal,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Receipt, CheckoutError> {
        if let Some(receipt) = self.replay(tenant_id, sale_id) {
            return Ok(receipt);
        }

        let mut seen = HashSet::new();
        for line in lines {
            if !seen.insert(line.product_id) {
                return Err(DomainError::validation(format!(
                    "product {} appears in more than one line",
                    line.product_id
                ))
                .into());
            }
        }

        // Price the cart from the current snapshots. Pricing validates
        // quantities, the discount range and the non-empty cart.
        let mut cart = Vec::with_capacity(lines.len());
        let mut debits = Vec::with_capacity(lines.len());
        for line in lines {
            let snapshot = self
                .snapshots
                .get(tenant_id, &line.product_id)
                .ok_or(CheckoutError::UnknownProduct { product_id: line.product_id })?;

            cart.push(CartLine {
                product_id: snapshot.product_id,
                name: snapshot.name.clone(),
                gross_unit_price: snapshot.sale_price,
                quantity: line.quantity,
                tax_exempt: snapshot.tax_exempt,
                price_includes_tax: snapshot.price_includes_tax,
            });
            debits.push((
                snapshot.unit_kind,
                Movement::sale_debit(
                    tenant_id,
                    line.product_id,
                    snapshot.unit_kind,
                    line.quantity,
                    actor,
                    now,
                )?,
            ));
        }
        let totals = aggregate_cart(&cart, discount)?;

        let product_ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let handles = self.locks.handles_sorted(tenant_id, &product_ids);
        let _guards: Vec<_> = handles
            .iter()
            .map(|h| h.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();

        // A concurrent retry of the same sale serialized behind these locks;
        // check the registry again before touching the ledger.
        if let Some(receipt) = self.replay(tenant_id, sale_id) {
            return Ok(receipt);
        }

        // Stock check against the ledger fold, all lines before any append.
        let mut versions = Vec::with_capacity(debits.len());
        let mut short = Vec::new();
        for (line, (unit_kind, _)) in lines.iter().zip(&debits) {
            let stored = self.movements.load_for_product(tenant_id, line.product_id)?;
            let current = valuate(stored.iter().map(|s| &s.movement), *unit_kind);
            if current.stock < line.quantity {
                short.push(line.product_id);
            }
            // Load order is by timestamp; the stream version is the highest
            // assigned sequence, so ask the store for it.
            versions.push(self.movements.stream_version(tenant_id, line.product_id)?);
        }
        if !short.is_empty() {
            return Err(CheckoutError::InsufficientStock { product_ids: short });
        }

        let receipt_number = self.receipts.next(tenant_id);

        let mut committed_movements = Vec::with_capacity(debits.len());
        for ((_, movement), version) in debits.into_iter().zip(versions) {
            let product_id = movement.product_id;
            let mut stored = self
                .movements
                .append(vec![movement], ExpectedVersion::Exact(version))?;
            committed_movements.append(&mut stored);
            self.engine.recompute(tenant_id, product_id)?;
        }

        let receipt = Receipt {
            sale_id,
            receipt_number,
            totals: totals.rounded(),
            movements: committed_movements,
            committed_at: now,
        };

        self.committed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((tenant_id, sale_id), receipt.clone());

        info!(
            %tenant_id,
            %sale_id,
            receipt_number = %receipt.receipt_number,
            lines = lines.len(),
            total = %receipt.totals.total,
            "committed sale"
        );
        Ok(receipt)
    }

    /// The receipt of an already-committed sale, if any.
    pub fn receipt(&self, tenant_id: TenantId, sale_id: SaleId) -> Option<Receipt> {
        self.replay(tenant_id, sale_id)
    }

    fn replay(&self, tenant_id: TenantId, sale_id: SaleId) -> Option<Receipt> {
        self.committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(tenant_id, sale_id))
            .cloned()
    }
}
