//! Catalog snapshot: the persisted, denormalized view of derived stock and
//! pricing flags that the register and reports read.
//!
//! The snapshot is a cache. It is only ever written from a full valuation
//! recompute over the movement ledger and is never authoritative on its own.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bodega_catalog::{Product, ProductId, UnitKind};
use bodega_core::TenantId;
use bodega_ledger::Valuation;

/// Denormalized product view: catalog fields the register needs plus the
/// derived `stock`/`average_cost` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub unit_kind: UnitKind,
    pub stock: Decimal,
    pub average_cost: Decimal,
    pub min_stock: Decimal,
    pub sale_price: Decimal,
    pub tax_exempt: bool,
    pub price_includes_tax: bool,
    pub updated_at: DateTime<Utc>,
}

impl ProductSnapshot {
    /// Initial snapshot for a just-registered product (no stock yet; the
    /// opening movement and recompute follow immediately).
    pub fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit_kind: product.unit_kind,
            stock: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            min_stock: product.min_stock,
            sale_price: product.sale_price,
            tax_exempt: product.tax_exempt,
            price_includes_tax: product.price_includes_tax,
            updated_at: product.created_at,
        }
    }

    pub fn apply_valuation(&mut self, valuation: Valuation, now: DateTime<Utc>) {
        self.stock = valuation.stock;
        self.average_cost = valuation.average_cost;
        self.updated_at = now;
    }

    /// Low-stock alert threshold check.
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

/// Tenant-isolated snapshot store.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductSnapshot>;
    fn upsert(&self, tenant_id: TenantId, snapshot: ProductSnapshot);
    fn list(&self, tenant_id: TenantId) -> Vec<ProductSnapshot>;
    /// Clear all snapshots for a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);

    /// Products at or below their alert threshold.
    fn list_below_min(&self, tenant_id: TenantId) -> Vec<ProductSnapshot> {
        self.list(tenant_id)
            .into_iter()
            .filter(ProductSnapshot::is_low_stock)
            .collect()
    }
}

impl<S> SnapshotStore for Arc<S>
where
    S: SnapshotStore + ?Sized,
{
    fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductSnapshot> {
        (**self).get(tenant_id, product_id)
    }

    fn upsert(&self, tenant_id: TenantId, snapshot: ProductSnapshot) {
        (**self).upsert(tenant_id, snapshot)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<ProductSnapshot> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory snapshot store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    inner: RwLock<HashMap<(TenantId, ProductId), ProductSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductSnapshot> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, *product_id)).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, snapshot: ProductSnapshot) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, snapshot.product_id), snapshot);
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<ProductSnapshot> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((t, _), v)| if *t == tenant_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _), _| *t != tenant_id);
        }
    }
}
