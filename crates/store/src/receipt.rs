//! Per-tenant sale receipt numbering.
//!
//! Receipt numbers are tenant-scoped, start at 1, and render zero-padded to
//! six digits. Allocation is serialized per tenant so two concurrent sales
//! can never draw the same number.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use bodega_core::TenantId;
use serde::{Deserialize, Serialize};

/// A tenant-scoped sale receipt number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptNumber(pub u64);

impl core::fmt::Display for ReceiptNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

/// Allocator of gapless, per-tenant receipt numbers.
pub trait ReceiptSequence: Send + Sync {
    /// Allocate the next receipt number for a tenant. Never returns the same
    /// number twice for one tenant.
    fn next(&self, tenant_id: TenantId) -> ReceiptNumber;
}

impl<S> ReceiptSequence for std::sync::Arc<S>
where
    S: ReceiptSequence + ?Sized,
{
    fn next(&self, tenant_id: TenantId) -> ReceiptNumber {
        (**self).next(tenant_id)
    }
}

/// In-memory receipt counter for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReceiptSequence {
    counters: Mutex<HashMap<TenantId, u64>>,
}

impl InMemoryReceiptSequence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReceiptSequence for InMemoryReceiptSequence {
    fn next(&self, tenant_id: TenantId) -> ReceiptNumber {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let counter = counters.entry(tenant_id).or_insert(0);
        *counter += 1;
        ReceiptNumber(*counter)
    }
}
