//! Catalog domain module.
//!
//! This crate contains the product catalog model: product identity, unit
//! kinds and their quantity precision, and the static category configuration
//! injected at startup. Derived stock figures live in the snapshot, not here.

pub mod categories;
pub mod product;

pub use categories::{Category, CategoryConfig};
pub use product::{Product, ProductId, SupplierId, UnitKind};
