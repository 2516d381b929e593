//! Per-product serialization for stock-mutating sequences.
//!
//! Every check-then-append sequence against one product must run under that
//! product's lock; movements to different products proceed in parallel.
//! Multi-product operations (a sale with several lines) must acquire their
//! locks in ascending product-id order to stay deadlock-free — see
//! [`ProductLocks::handles_sorted`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bodega_catalog::ProductId;
use bodega_core::TenantId;

/// Registry of per-product mutexes, shared by every service that mutates
/// stock for the same stores.
#[derive(Debug, Default, Clone)]
pub struct ProductLocks {
    inner: Arc<Mutex<HashMap<(TenantId, ProductId), Arc<Mutex<()>>>>>,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for one product. Callers hold the guard for the whole
    /// check → append → snapshot-update sequence.
    pub fn handle(&self, tenant_id: TenantId, product_id: ProductId) -> Arc<Mutex<()>> {
        // The guards protect no data of their own, so a poisoned registry or
        // handle is still safe to reuse.
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry((tenant_id, product_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Lock handles for a set of products in ascending product-id order.
    pub fn handles_sorted(
        &self,
        tenant_id: TenantId,
        product_ids: &[ProductId],
    ) -> Vec<Arc<Mutex<()>>> {
        let mut ids: Vec<ProductId> = product_ids.to_vec();
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .map(|product_id| self.handle(tenant_id, product_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bodega_core::AggregateId;

    #[test]
    fn same_product_shares_a_handle() {
        let locks = ProductLocks::new();
        let tenant_id = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());

        let a = locks.handle(tenant_id, product_id);
        let b = locks.handle(tenant_id, product_id);
        assert!(Arc::ptr_eq(&a, &b));

        let other = locks.handle(tenant_id, ProductId::new(AggregateId::new()));
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn sorted_handles_deduplicate() {
        let locks = ProductLocks::new();
        let tenant_id = TenantId::new();
        let p1 = ProductId::new(AggregateId::new());
        let p2 = ProductId::new(AggregateId::new());

        let handles = locks.handles_sorted(tenant_id, &[p2, p1, p2]);
        assert_eq!(handles.len(), 2);
    }
}
