//! Valuation fold: derive stock and weighted-average cost from a movement
//! history.
//!
//! The fold is a full replay by design. It is not an incremental updater: it
//! recomputes from scratch every time so it can always repair a drifted
//! snapshot from the immutable ledger, which is the only authoritative state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bodega_catalog::UnitKind;

use crate::movement::Movement;

/// Derived pair the catalog snapshot caches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    /// Σ `quantity_delta` over ALL movement kinds, rounded to the unit kind's
    /// precision.
    pub stock: Decimal,
    /// Σ(qty × unit_cost) / Σ(qty) over inbound receipts only; zero when no
    /// inbound quantity exists. Outbound movements never alter it.
    pub average_cost: Decimal,
}

impl Valuation {
    pub fn zero() -> Self {
        Self {
            stock: Decimal::ZERO,
            average_cost: Decimal::ZERO,
        }
    }
}

/// Fold an ordered movement history into its valuation.
///
/// Order does not affect the result (both sums are commutative); it matters
/// only for [`history`], which exposes running balances.
pub fn valuate<'a, I>(movements: I, unit_kind: UnitKind) -> Valuation
where
    I: IntoIterator<Item = &'a Movement>,
{
    let mut stock = Decimal::ZERO;
    let mut inbound_quantity = Decimal::ZERO;
    let mut inbound_cost = Decimal::ZERO;

    for m in movements {
        stock += m.quantity_delta;
        if m.is_inbound_receipt() {
            inbound_quantity += m.quantity_delta;
            inbound_cost += m.quantity_delta * m.unit_cost.unwrap_or(Decimal::ZERO);
        }
    }

    let average_cost = if inbound_quantity.is_zero() {
        Decimal::ZERO
    } else {
        inbound_cost / inbound_quantity
    };

    Valuation {
        stock: unit_kind.round(stock),
        average_cost,
    }
}

/// One movement enriched with the stock balance around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub movement: Movement,
    pub opening_stock: Decimal,
    pub closing_stock: Decimal,
}

/// Walk an ordered history and attach running opening/closing balances to
/// each movement (the inventory movements report).
pub fn history<'a, I>(movements: I, unit_kind: UnitKind) -> Vec<LedgerEntry>
where
    I: IntoIterator<Item = &'a Movement>,
{
    let mut balance = Decimal::ZERO;
    movements
        .into_iter()
        .map(|m| {
            let opening_stock = balance;
            balance = unit_kind.round(balance + m.quantity_delta);
            LedgerEntry {
                movement: m.clone(),
                opening_stock,
                closing_stock: balance,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::MovementKind;
    use bodega_catalog::ProductId;
    use bodega_core::{AggregateId, TenantId, UserId};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn inbound(qty: Decimal, cost: Decimal) -> Movement {
        Movement::inbound_receipt(
            TenantId::new(),
            ProductId::new(AggregateId::new()),
            UnitKind::ByWeight,
            qty,
            cost,
            UserId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    fn adjustment(delta: Decimal) -> Movement {
        Movement::manual_adjustment(
            TenantId::new(),
            ProductId::new(AggregateId::new()),
            UnitKind::ByWeight,
            delta,
            "recount",
            UserId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    fn debit(qty: Decimal) -> Movement {
        Movement::sale_debit(
            TenantId::new(),
            ProductId::new(AggregateId::new()),
            UnitKind::ByWeight,
            qty,
            UserId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn empty_history_values_to_zero() {
        let movements: Vec<Movement> = Vec::new();
        assert_eq!(valuate(&movements, UnitKind::Discrete), Valuation::zero());
    }

    #[test]
    fn weighted_average_over_inbound_only() {
        // 10 @ 2.00 and 5 @ 5.00 => (20 + 25) / 15 = 3.00
        let movements = vec![inbound(dec!(10), dec!(2.00)), inbound(dec!(5), dec!(5.00))];
        let v = valuate(&movements, UnitKind::ByWeight);
        assert_eq!(v.stock, dec!(15));
        assert_eq!(v.average_cost, dec!(3));
    }

    #[test]
    fn outbound_movements_never_alter_average_cost() {
        let movements = vec![
            inbound(dec!(10), dec!(2.00)),
            debit(dec!(4)),
            adjustment(dec!(-1)),
        ];
        let v = valuate(&movements, UnitKind::ByWeight);
        assert_eq!(v.stock, dec!(5));
        assert_eq!(v.average_cost, dec!(2));
    }

    #[test]
    fn zero_inbound_denominator_gives_zero_average_cost() {
        let movements = vec![adjustment(dec!(3)), debit(dec!(1))];
        let v = valuate(&movements, UnitKind::ByWeight);
        assert_eq!(v.stock, dec!(2));
        assert_eq!(v.average_cost, dec!(0));
    }

    #[test]
    fn stock_can_reach_exactly_zero() {
        let movements = vec![inbound(dec!(5), dec!(1)), debit(dec!(5))];
        let v = valuate(&movements, UnitKind::ByWeight);
        assert_eq!(v.stock, dec!(0));
        assert_eq!(v.average_cost, dec!(1));
    }

    #[test]
    fn history_attaches_running_balances() {
        let movements = vec![
            inbound(dec!(10), dec!(2.00)),
            debit(dec!(3)),
            adjustment(dec!(-2)),
        ];
        let entries = history(&movements, UnitKind::ByWeight);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].opening_stock, dec!(0));
        assert_eq!(entries[0].closing_stock, dec!(10));
        assert_eq!(entries[1].opening_stock, dec!(10));
        assert_eq!(entries[1].closing_stock, dec!(7));
        assert_eq!(entries[2].opening_stock, dec!(7));
        assert_eq!(entries[2].closing_stock, dec!(5));
        assert_eq!(entries[2].movement.kind, MovementKind::ManualAdjustment);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn inbound_batch() -> impl Strategy<Value = Vec<(i64, i64)>> {
            // (quantity in grams, unit cost in centavos), both positive.
            prop::collection::vec((1i64..100_000, 0i64..1_000_000), 1..20)
        }

        fn to_movements(batch: &[(i64, i64)]) -> Vec<Movement> {
            batch
                .iter()
                .map(|&(grams, centavos)| {
                    inbound(
                        Decimal::new(grams, 3),
                        Decimal::new(centavos, 2),
                    )
                })
                .collect()
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: the weighted average equals Σ(q·c)/Σ(q) and is
            /// independent of insertion order.
            #[test]
            fn weighted_average_is_order_independent(
                batch in inbound_batch(),
                seed in any::<u64>(),
            ) {
                let movements = to_movements(&batch);

                let mut shuffled = movements.clone();
                // Cheap deterministic shuffle driven by the seed.
                let len = shuffled.len();
                let mut state = seed;
                for i in (1..len).rev() {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    let j = (state % (i as u64 + 1)) as usize;
                    shuffled.swap(i, j);
                }

                let a = valuate(&movements, UnitKind::ByWeight);
                let b = valuate(&shuffled, UnitKind::ByWeight);
                prop_assert_eq!(a.average_cost, b.average_cost);
                prop_assert_eq!(a.stock, b.stock);

                let qty: Decimal = movements.iter().map(|m| m.quantity_delta).sum();
                let cost: Decimal = movements
                    .iter()
                    .map(|m| m.quantity_delta * m.unit_cost.unwrap())
                    .sum();
                prop_assert_eq!(a.average_cost, cost / qty);
            }

            /// Property: stock is exactly Σ quantity_delta over any mix of
            /// movement kinds.
            #[test]
            fn stock_is_exact_sum_of_deltas(
                deltas in prop::collection::vec(-50_000i64..50_000, 1..30),
            ) {
                let movements: Vec<Movement> = deltas
                    .iter()
                    .filter(|&&d| d != 0)
                    .map(|&d| adjustment(Decimal::new(d, 3)))
                    .collect();

                let expected: Decimal =
                    movements.iter().map(|m| m.quantity_delta).sum();
                let v = valuate(&movements, UnitKind::ByWeight);
                prop_assert_eq!(v.stock, expected);
            }

            /// Property: history balances telescope (each opening equals the
            /// previous closing, and the last closing equals the fold's stock).
            #[test]
            fn history_balances_telescope(
                deltas in prop::collection::vec(-10_000i64..10_000, 1..20),
            ) {
                let movements: Vec<Movement> = deltas
                    .iter()
                    .filter(|&&d| d != 0)
                    .map(|&d| adjustment(Decimal::new(d, 3)))
                    .collect();
                prop_assume!(!movements.is_empty());

                let entries = history(&movements, UnitKind::ByWeight);
                for pair in entries.windows(2) {
                    prop_assert_eq!(pair[0].closing_stock, pair[1].opening_stock);
                }
                let v = valuate(&movements, UnitKind::ByWeight);
                prop_assert_eq!(entries.last().unwrap().closing_stock, v.stock);
            }
        }
    }
}
