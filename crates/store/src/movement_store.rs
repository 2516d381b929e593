//! Append-only, tenant-scoped movement streams.
//!
//! One stream per `(tenant_id, product_id)`. Within a stream, movements carry
//! monotonically increasing sequence numbers assigned at append time; the
//! stream version is the last assigned sequence number (0 when empty).
//! Movements are immutable once committed: the store exposes no update or
//! delete operation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use bodega_catalog::ProductId;
use bodega_core::{ExpectedVersion, TenantId};
use bodega_ledger::Movement;

/// A movement persisted to a stream (assigned a sequence number).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredMovement {
    pub movement: Movement,
    /// Monotonically increasing position in the product's stream.
    pub sequence_number: u64,
}

/// Movement store operation error.
///
/// These are infrastructure errors (storage, concurrency, isolation);
/// deterministic domain failures are rejected in `bodega-ledger` before a
/// movement reaches the store.
#[derive(Debug, Error)]
pub enum MovementStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// Append-only, tenant-scoped movement store.
///
/// Implementations must:
/// - enforce tenant isolation (reject cross-tenant batches)
/// - enforce optimistic concurrency against the current stream version
/// - assign monotonically increasing sequence numbers starting at
///   `current_version + 1`
/// - persist a batch atomically (all movements or none)
pub trait MovementStore: Send + Sync {
    /// Append movements to one product's stream (append-only).
    fn append(
        &self,
        movements: Vec<Movement>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredMovement>, MovementStoreError>;

    /// Load a product's full history, ordered by `occurred_at` ascending with
    /// ties broken by sequence number. The order is stable because the
    /// valuation fold and the movements report both replay it.
    fn load_for_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Vec<StoredMovement>, MovementStoreError>;

    /// Current version of a product's stream (0 when empty).
    fn stream_version(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<u64, MovementStoreError>;
}

impl<S> MovementStore for Arc<S>
where
    S: MovementStore + ?Sized,
{
    fn append(
        &self,
        movements: Vec<Movement>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredMovement>, MovementStoreError> {
        (**self).append(movements, expected_version)
    }

    fn load_for_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Vec<StoredMovement>, MovementStoreError> {
        (**self).load_for_product(tenant_id, product_id)
    }

    fn stream_version(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<u64, MovementStoreError> {
        (**self).stream_version(tenant_id, product_id)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    product_id: ProductId,
}

/// In-memory append-only movement store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryMovementStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredMovement>>>,
}

impl InMemoryMovementStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredMovement]) -> u64 {
        stream.last().map(|m| m.sequence_number).unwrap_or(0)
    }
}

impl MovementStore for InMemoryMovementStore {
    fn append(
        &self,
        movements: Vec<Movement>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredMovement>, MovementStoreError> {
        if movements.is_empty() {
            return Ok(vec![]);
        }

        // All movements must target the same tenant + product stream.
        let tenant_id = movements[0].tenant_id;
        let product_id = movements[0].product_id;

        for (idx, m) in movements.iter().enumerate() {
            if m.tenant_id != tenant_id {
                return Err(MovementStoreError::TenantIsolation(format!(
                    "batch contains multiple tenant_ids (index {idx})"
                )));
            }
            if m.product_id != product_id {
                return Err(MovementStoreError::InvalidAppend(format!(
                    "batch contains multiple product_ids (index {idx})"
                )));
            }
        }

        let key = StreamKey {
            tenant_id,
            product_id,
        };

        let mut streams = self
            .streams
            .write()
            .map_err(|_| MovementStoreError::Persistence("lock poisoned".to_string()))?;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(MovementStoreError::Conflict(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // Assign sequence numbers and append (append-only).
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(movements.len());
        for movement in movements {
            let stored = StoredMovement {
                movement,
                sequence_number: next,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_for_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Vec<StoredMovement>, MovementStoreError> {
        let key = StreamKey {
            tenant_id,
            product_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| MovementStoreError::Persistence("lock poisoned".to_string()))?;

        let mut history = streams.get(&key).cloned().unwrap_or_default();
        // Sequence order is insertion order; timestamp wins, sequence breaks
        // ties (backdated receipts may land mid-history).
        history.sort_by(|a, b| {
            a.movement
                .occurred_at
                .cmp(&b.movement.occurred_at)
                .then(a.sequence_number.cmp(&b.sequence_number))
        });
        Ok(history)
    }

    fn stream_version(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<u64, MovementStoreError> {
        let key = StreamKey {
            tenant_id,
            product_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| MovementStoreError::Persistence("lock poisoned".to_string()))?;

        Ok(streams.get(&key).map(|s| Self::current_version(s)).unwrap_or(0))
    }
}
