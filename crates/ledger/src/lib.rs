//! Inventory ledger domain module.
//!
//! This crate contains the business rules of the movement ledger, implemented
//! purely as deterministic domain logic (no IO, no storage): the immutable
//! `Movement` record with its validation invariants, and the valuation fold
//! that derives stock and weighted-average cost from a movement history.

pub mod movement;
pub mod valuation;

pub use movement::{Movement, MovementId, MovementKind};
pub use valuation::{LedgerEntry, Valuation, history, valuate};
