//! Storage and orchestration layer: movement streams, catalog snapshots, the
//! valuation engine, and the checkout path that debits stock.
//!
//! Storage backends are abstracted behind traits; the in-memory
//! implementations here are the reference semantics (append-only streams,
//! tenant isolation, optimistic concurrency) any real backend must preserve.

pub mod checkout;
pub mod engine;
pub mod locks;
pub mod movement_store;
pub mod receipt;
pub mod service;
pub mod snapshot;

pub use checkout::{CheckoutError, CheckoutService, Receipt, SaleId, SaleLine};
pub use engine::{EngineError, ValuationEngine};
pub use locks::ProductLocks;
pub use movement_store::{InMemoryMovementStore, MovementStore, MovementStoreError, StoredMovement};
pub use receipt::{InMemoryReceiptSequence, ReceiptNumber, ReceiptSequence};
pub use service::{LedgerService, NewMovement, OpeningStock, ServiceError};
pub use snapshot::{InMemorySnapshotStore, ProductSnapshot, SnapshotStore};
