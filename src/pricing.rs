//! Order total arithmetic. Everything here is pure: identical inputs always
//! produce identical `OrderTotals`.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{CartLine, DiscountCode, DiscountKind, OrderTotals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingRule {
    pub flat_rate: Decimal,
    /// Orders strictly above this subtotal ship for free.
    pub free_threshold: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
    pub shipping: ShippingRule,
    pub tax_rate: Decimal,
}

impl PricingConfig {
    pub fn compute(
        &self,
        subtotal: Decimal,
        discount: Option<&DiscountCode>,
        add_on_fees: Decimal,
    ) -> OrderTotals {
        compute(subtotal, discount, &self.shipping, self.tax_rate, add_on_fees)
    }
}

/// Half-up rounding to cents.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn subtotal(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::line_total).sum()
}

pub fn shipping_fee(subtotal: Decimal, rule: &ShippingRule) -> Decimal {
    if subtotal > rule.free_threshold {
        Decimal::ZERO
    } else {
        round_money(rule.flat_rate)
    }
}

pub fn discount_amount(subtotal: Decimal, discount: &DiscountCode) -> Decimal {
    let value = discount.value.max(Decimal::ZERO);
    match discount.kind {
        DiscountKind::Percentage => round_money(subtotal * value / Decimal::ONE_HUNDRED),
        DiscountKind::Fixed => value.min(subtotal),
    }
}

pub fn compute(
    subtotal: Decimal,
    discount: Option<&DiscountCode>,
    shipping: &ShippingRule,
    tax_rate: Decimal,
    add_on_fees: Decimal,
) -> OrderTotals {
    let shipping_fee = shipping_fee(subtotal, shipping);
    let tax_amount = round_money(subtotal * tax_rate);
    let add_on_fees = round_money(add_on_fees.max(Decimal::ZERO));

    let chargeable = subtotal + shipping_fee + tax_amount + add_on_fees;
    let discount_amount = discount
        .map(|discount| discount_amount(subtotal, discount))
        .unwrap_or(Decimal::ZERO)
        .min(chargeable);

    let grand_total =
        (subtotal + shipping_fee + tax_amount - discount_amount + add_on_fees).max(Decimal::ZERO);

    OrderTotals {
        subtotal,
        shipping_fee,
        tax_amount,
        discount_amount,
        add_on_fees,
        grand_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn money(units: i64, cents: u32) -> Decimal {
        Decimal::new(units * 100 + i64::from(cents), 2)
    }

    fn percentage(value: i64) -> DiscountCode {
        DiscountCode {
            id: Uuid::new_v4(),
            code: "SAVE".into(),
            kind: DiscountKind::Percentage,
            value: Decimal::from(value),
            max_uses: None,
            used_count: 0,
            expires_at: None,
            active: true,
        }
    }

    #[test]
    fn tax_rounds_half_up() {
        // 10.25 * 0.1 = 1.025 -> 1.03 (banker's rounding would give 1.02)
        let rule = ShippingRule {
            flat_rate: Decimal::ZERO,
            free_threshold: Decimal::ZERO,
        };
        let totals = compute(money(10, 25), None, &rule, Decimal::new(1, 1), Decimal::ZERO);
        assert_eq!(totals.tax_amount, money(1, 3));
    }

    #[test]
    fn percentage_discount_rounds_half_up() {
        // 0.05 * 10% = 0.005 -> 0.01
        assert_eq!(discount_amount(money(0, 5), &percentage(10)), money(0, 1));
    }

    #[test]
    fn negative_add_on_fees_are_ignored() {
        let rule = ShippingRule {
            flat_rate: Decimal::ZERO,
            free_threshold: Decimal::ZERO,
        };
        let totals = compute(money(10, 0), None, &rule, Decimal::ZERO, money(-5, 0));
        assert_eq!(totals.add_on_fees, Decimal::ZERO);
        assert_eq!(totals.grand_total, money(10, 0));
    }

    #[test]
    fn add_on_fees_are_charged_in_cents() {
        let rule = ShippingRule {
            flat_rate: money(15, 0),
            free_threshold: money(150, 0),
        };
        let fees = Decimal::new(1005, 3);
        let totals = compute(money(100, 0), None, &rule, Decimal::new(8, 2), fees);
        assert_eq!(totals.add_on_fees, money(1, 1));
        assert_eq!(totals.grand_total, money(124, 1));
        assert!(totals.grand_total.scale() <= 2);
    }

    #[test]
    fn subtotal_sums_line_totals() {
        let lines = vec![
            CartLine {
                product_id: 1,
                name: "Mug".into(),
                unit_price: money(12, 50),
                quantity: 2,
                image_ref: String::new(),
            },
            CartLine {
                product_id: 2,
                name: "Sticker".into(),
                unit_price: money(0, 99),
                quantity: 3,
                image_ref: String::new(),
            },
        ];
        assert_eq!(subtotal(&lines), money(27, 97));
    }
}
