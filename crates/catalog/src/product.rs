use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use bodega_core::{AggregateId, DomainError, DomainResult};

use crate::categories::CategoryConfig;

/// Product identifier (tenant-scoped via the `tenant_id` argument on every
/// ledger and snapshot operation).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Supplier reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// How a product is counted.
///
/// Discrete products carry integer stock; by-weight products (produce, bulk
/// goods sold per kilogram) carry stock to 3 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    Discrete,
    ByWeight,
}

impl UnitKind {
    /// Number of decimal places a quantity of this kind carries.
    pub fn precision(self) -> u32 {
        match self {
            UnitKind::Discrete => 0,
            UnitKind::ByWeight => 3,
        }
    }

    /// Round a quantity to this kind's precision (half-even).
    pub fn round(self, quantity: Decimal) -> Decimal {
        quantity.round_dp_with_strategy(self.precision(), RoundingStrategy::MidpointNearestEven)
    }

    /// A quantity is representable if rounding does not change it.
    pub fn admits(self, quantity: Decimal) -> bool {
        self.round(quantity) == quantity
    }
}

/// Catalog product.
///
/// `stock` and `average_cost` are intentionally absent: both are derived by
/// the valuation engine from the movement ledger and live in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub unit_kind: UnitKind,
    /// Alert threshold: stock at or below this is reported as low.
    pub min_stock: Decimal,
    /// Gross sale price (tax-inclusive unless `price_includes_tax` is false).
    pub sale_price: Decimal,
    pub tax_exempt: bool,
    pub price_includes_tax: bool,
    pub supplier_id: Option<SupplierId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Build a validated product against the injected category configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        category: impl Into<String>,
        subcategory: Option<String>,
        unit_kind: UnitKind,
        min_stock: Decimal,
        sale_price: Decimal,
        config: &CategoryConfig,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        let category = category.into();

        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if sale_price < Decimal::ZERO {
            return Err(DomainError::validation("sale_price cannot be negative"));
        }
        if min_stock < Decimal::ZERO {
            return Err(DomainError::validation("min_stock cannot be negative"));
        }
        if !unit_kind.admits(min_stock) {
            return Err(DomainError::validation(format!(
                "min_stock {min_stock} exceeds the precision of the unit kind"
            )));
        }
        config.validate(&category, subcategory.as_deref())?;

        Ok(Self {
            id,
            name,
            category,
            subcategory,
            unit_kind,
            min_stock,
            sale_price,
            tax_exempt: false,
            price_includes_tax: true,
            supplier_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_tax_exempt(mut self, exempt: bool) -> Self {
        self.tax_exempt = exempt;
        self
    }

    pub fn with_price_includes_tax(mut self, includes: bool) -> Self {
        self.price_includes_tax = includes;
        self
    }

    pub fn with_supplier(mut self, supplier_id: SupplierId) -> Self {
        self.supplier_id = Some(supplier_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;
    use rust_decimal_macros::dec;

    fn test_config() -> CategoryConfig {
        CategoryConfig::new(vec![
            Category::new("Abarrotes", &["Arroz", "Aceites"]),
            Category::new("Frutas y Verduras", &[]),
        ])
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    #[test]
    fn builds_product_with_defaults() {
        let p = Product::new(
            test_product_id(),
            "Arroz Costeño 1kg",
            "Abarrotes",
            Some("Arroz".to_string()),
            UnitKind::Discrete,
            dec!(5),
            dec!(4.50),
            &test_config(),
            Utc::now(),
        )
        .unwrap();

        assert!(p.price_includes_tax);
        assert!(!p.tax_exempt);
        assert_eq!(p.supplier_id, None);
    }

    #[test]
    fn rejects_empty_name() {
        let err = Product::new(
            test_product_id(),
            "   ",
            "Abarrotes",
            None,
            UnitKind::Discrete,
            dec!(0),
            dec!(1),
            &test_config(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_unknown_category() {
        let err = Product::new(
            test_product_id(),
            "Leche Gloria",
            "Lácteos",
            None,
            UnitKind::Discrete,
            dec!(0),
            dec!(3.80),
            &test_config(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_fractional_min_stock_for_discrete() {
        let err = Product::new(
            test_product_id(),
            "Atún Florida",
            "Abarrotes",
            None,
            UnitKind::Discrete,
            dec!(1.5),
            dec!(6.20),
            &test_config(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn discrete_rounds_to_whole_units() {
        assert_eq!(UnitKind::Discrete.round(dec!(2.5)), dec!(2));
        assert_eq!(UnitKind::Discrete.round(dec!(3.5)), dec!(4));
        assert!(!UnitKind::Discrete.admits(dec!(0.25)));
    }

    #[test]
    fn by_weight_keeps_three_decimals() {
        assert_eq!(UnitKind::ByWeight.round(dec!(1.2345)), dec!(1.234));
        assert!(UnitKind::ByWeight.admits(dec!(0.125)));
        assert!(!UnitKind::ByWeight.admits(dec!(0.1255)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: rounding is idempotent, so every rounded quantity is
            /// admitted by its unit kind.
            #[test]
            fn rounded_quantities_are_always_admitted(
                micrograms in 0i64..10_000_000_000,
                by_weight in proptest::bool::ANY,
            ) {
                let kind = if by_weight { UnitKind::ByWeight } else { UnitKind::Discrete };
                let quantity = Decimal::new(micrograms, 6);
                let rounded = kind.round(quantity);
                prop_assert!(kind.admits(rounded));
                prop_assert_eq!(kind.round(rounded), rounded);
            }
        }
    }
}
