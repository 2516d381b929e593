//! Sale pricing and tax domain module.
//!
//! Pure arithmetic used at checkout: decomposition of tax-inclusive gross
//! amounts into base and tax, and aggregation of cart lines into taxed/exempt
//! subtotals with a flat cart-level discount. No IO, no storage.

pub mod cart;
pub mod tax;

pub use cart::{CartLine, CartTotals, aggregate_cart, aggregate_cart_with_rate};
pub use tax::{DEFAULT_TAX_RATE, TaxBreakdown, decompose, round_money};
