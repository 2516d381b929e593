//! Tax decomposition of gross, tax-inclusive amounts.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Default sales tax rate (18% IGV).
pub const DEFAULT_TAX_RATE: Decimal = dec!(0.18);

/// A gross amount split into its pre-tax base and the tax it embeds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub base: Decimal,
    pub tax: Decimal,
}

/// Split a gross line amount into base and tax.
///
/// Exempt lines and lines whose price does not include tax contribute their
/// full gross amount as base with zero tax. For taxed, tax-inclusive lines,
/// `base = gross / (1 + rate)` and `tax = gross - base`.
///
/// Results are unrounded. Rounding is the caller's currency policy; apply
/// [`round_money`] at presentation time only, never before aggregation, so
/// rounding error cannot compound across lines.
pub fn decompose(
    gross: Decimal,
    tax_exempt: bool,
    price_includes_tax: bool,
    rate: Decimal,
) -> TaxBreakdown {
    if tax_exempt || !price_includes_tax {
        return TaxBreakdown {
            base: gross,
            tax: Decimal::ZERO,
        };
    }

    let base = gross / (Decimal::ONE + rate);
    TaxBreakdown {
        base,
        tax: gross - base,
    }
}

/// Round a monetary amount to 2 decimals, half to even.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}
