//! Cart aggregation: taxed/exempt subtotals and the discount-adjusted total.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bodega_catalog::ProductId;
use bodega_core::{DomainError, DomainResult};

use crate::tax::{DEFAULT_TAX_RATE, decompose, round_money};

/// One register line: a product at a gross unit price and a quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    /// Gross unit price (tax-inclusive unless `price_includes_tax` is false).
    pub gross_unit_price: Decimal,
    pub quantity: Decimal,
    pub tax_exempt: bool,
    pub price_includes_tax: bool,
}

impl CartLine {
    /// Gross amount of the whole line.
    pub fn gross_amount(&self) -> Decimal {
        self.gross_unit_price * self.quantity
    }

    /// A line is taxed when it is not exempt and its price embeds the tax.
    fn is_taxed(&self) -> bool {
        !self.tax_exempt && self.price_includes_tax
    }
}

/// Aggregated cart amounts.
///
/// `gross_total` is the direct sum of gross line amounts — it already embeds
/// the tax of taxed lines and is NOT `taxed_subtotal + exempt_subtotal +
/// tax_total` recomputed. The subtotal/tax split exists for receipts and
/// reporting. `total` is `gross_total - discount`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    pub taxed_subtotal: Decimal,
    pub exempt_subtotal: Decimal,
    pub tax_total: Decimal,
    pub gross_total: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl CartTotals {
    /// Presentation copy with every amount rounded to 2 decimals, half-even.
    /// Aggregation itself always runs unrounded.
    pub fn rounded(&self) -> CartTotals {
        CartTotals {
            taxed_subtotal: round_money(self.taxed_subtotal),
            exempt_subtotal: round_money(self.exempt_subtotal),
            tax_total: round_money(self.tax_total),
            gross_total: round_money(self.gross_total),
            discount: round_money(self.discount),
            total: round_money(self.total),
        }
    }
}

/// Aggregate cart lines at the default tax rate.
pub fn aggregate_cart(lines: &[CartLine], discount: Decimal) -> DomainResult<CartTotals> {
    aggregate_cart_with_rate(lines, discount, DEFAULT_TAX_RATE)
}

/// Aggregate cart lines into totals, validating lines and the discount.
///
/// The discount is a flat monetary amount subtracted once from the gross
/// total; it is never prorated across lines.
pub fn aggregate_cart_with_rate(
    lines: &[CartLine],
    discount: Decimal,
    rate: Decimal,
) -> DomainResult<CartTotals> {
    if lines.is_empty() {
        return Err(DomainError::validation("cart has no lines"));
    }

    let mut taxed_subtotal = Decimal::ZERO;
    let mut exempt_subtotal = Decimal::ZERO;
    let mut tax_total = Decimal::ZERO;
    let mut gross_total = Decimal::ZERO;

    for line in lines {
        if line.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "line quantity must be positive (product {})",
                line.product_id
            )));
        }
        if line.gross_unit_price < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "line price cannot be negative (product {})",
                line.product_id
            )));
        }

        let gross = line.gross_amount();
        gross_total += gross;

        if line.is_taxed() {
            // Decompose the whole line amount so base + tax reconstructs the
            // line gross exactly.
            let b = decompose(gross, false, true, rate);
            taxed_subtotal += b.base;
            tax_total += b.tax;
        } else {
            exempt_subtotal += gross;
        }
    }

    if discount < Decimal::ZERO {
        return Err(DomainError::validation("discount cannot be negative"));
    }
    if discount > gross_total {
        return Err(DomainError::validation(format!(
            "discount {discount} exceeds gross total {gross_total}"
        )));
    }

    Ok(CartTotals {
        taxed_subtotal,
        exempt_subtotal,
        tax_total,
        gross_total,
        discount,
        total: gross_total - discount,
    })
}
