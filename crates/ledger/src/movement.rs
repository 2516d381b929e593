use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bodega_catalog::{ProductId, UnitKind};
use bodega_core::{AggregateId, DomainError, DomainResult, TenantId, UserId};

/// Movement identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub AggregateId);

impl MovementId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Kind of stock-changing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MovementKind {
    /// Stock received at a unit cost (purchases, opening stock).
    InboundReceipt,
    /// Signed correction with a mandatory reason.
    ManualAdjustment,
    /// Outbound debit committed by a sale.
    SaleDebit,
}

/// An immutable, timestamped quantity change against one product.
///
/// Movements are facts: once committed to the store they are never mutated or
/// deleted. All validation happens in the constructors below, before a
/// movement can reach the store.
///
/// Field semantics:
/// - `quantity_delta` is signed (positive inbound, negative outbound).
/// - `unit_cost` is meaningful only for inbound receipts; constructors
///   normalize it away elsewhere.
/// - `reason` is mandatory and non-blank for manual adjustments; it is
///   ignored (normalized to `None`) for the other kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity_delta: Decimal,
    pub unit_cost: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
    pub kind: MovementKind,
    pub actor: UserId,
    pub reason: Option<String>,
}

impl Movement {
    /// Inbound receipt: positive quantity at a non-negative unit cost.
    pub fn inbound_receipt(
        tenant_id: TenantId,
        product_id: ProductId,
        unit_kind: UnitKind,
        quantity: Decimal,
        unit_cost: Decimal,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        check_delta(quantity, unit_kind)?;
        if quantity < Decimal::ZERO {
            return Err(DomainError::validation(
                "inbound receipt quantity must be positive",
            ));
        }
        if unit_cost < Decimal::ZERO {
            return Err(DomainError::validation("unit_cost cannot be negative"));
        }

        Ok(Self {
            id: MovementId::new(AggregateId::new()),
            tenant_id,
            product_id,
            quantity_delta: quantity,
            unit_cost: Some(unit_cost),
            occurred_at,
            kind: MovementKind::InboundReceipt,
            actor,
            reason: None,
        })
    }

    /// Manual adjustment: signed non-zero delta with a non-blank reason.
    pub fn manual_adjustment(
        tenant_id: TenantId,
        product_id: ProductId,
        unit_kind: UnitKind,
        delta: Decimal,
        reason: impl Into<String>,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        check_delta(delta, unit_kind)?;
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(DomainError::validation(
                "manual adjustment requires a non-empty reason",
            ));
        }

        Ok(Self {
            id: MovementId::new(AggregateId::new()),
            tenant_id,
            product_id,
            quantity_delta: delta,
            unit_cost: None,
            occurred_at,
            kind: MovementKind::ManualAdjustment,
            actor,
            reason: Some(reason),
        })
    }

    /// Sale debit for a positive requested quantity (stored as a negative
    /// delta). Availability against current stock is checked at commit time,
    /// not here.
    pub fn sale_debit(
        tenant_id: TenantId,
        product_id: ProductId,
        unit_kind: UnitKind,
        requested_quantity: Decimal,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        check_delta(requested_quantity, unit_kind)?;
        if requested_quantity <= Decimal::ZERO {
            return Err(DomainError::validation(
                "sale debit quantity must be positive",
            ));
        }

        Ok(Self {
            id: MovementId::new(AggregateId::new()),
            tenant_id,
            product_id,
            quantity_delta: -requested_quantity,
            unit_cost: None,
            occurred_at,
            kind: MovementKind::SaleDebit,
            actor,
            reason: None,
        })
    }

    pub fn is_inbound_receipt(&self) -> bool {
        self.kind == MovementKind::InboundReceipt
    }
}

fn check_delta(delta: Decimal, unit_kind: UnitKind) -> DomainResult<()> {
    if delta.is_zero() {
        return Err(DomainError::validation("quantity_delta cannot be zero"));
    }
    if !unit_kind.admits(delta.abs()) {
        return Err(DomainError::validation(format!(
            "quantity {delta} exceeds the precision of the unit kind"
        )));
    }
    Ok(())
}
