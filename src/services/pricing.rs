//! Cart totals engine.
//!
//! Pure computation over cart line items; the cart service calls this before
//! every persistence so the stored totals are never hand-set. Currency amounts
//! are rounded to two decimal places where division is involved.

use rust_decimal::Decimal;

use crate::entities::cart_item;

/// Discount inputs as stored on the cart. When `percentage` is positive it
/// wins over the flat `amount` and the effective amount is re-derived from the
/// current total price.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discount {
    pub amount: Decimal,
    pub percentage: Decimal,
}

/// Fully derived cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub total_items: i32,
    pub total_price: Decimal,
    pub discount_amount: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub final_total: Decimal,
}

impl CartTotals {
    pub fn zero() -> Self {
        Self {
            total_items: 0,
            total_price: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            final_total: Decimal::ZERO,
        }
    }
}

/// Effective discount amount for a given total price.
pub fn discount_amount(total_price: Decimal, discount: Discount) -> Decimal {
    if discount.percentage > Decimal::ZERO {
        (discount.percentage * total_price / Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        discount.amount
    }
}

/// Recompute every derived cart field from the current line items.
///
/// - total_items = sum of quantities
/// - total_price = sum of (unit price + customization extras) x quantity
/// - subtotal = max(0, total_price - discount)
/// - tax_amount = subtotal x tax_rate / 100
/// - final_total = subtotal + tax_amount + delivery_fee
pub fn compute_totals(
    items: &[cart_item::Model],
    discount: Discount,
    tax_rate: Decimal,
    delivery_fee: Decimal,
) -> CartTotals {
    let total_items: i32 = items.iter().map(|i| i.quantity).sum();
    let total_price: Decimal = items.iter().map(|i| i.line_total()).sum();

    let discount_amount = discount_amount(total_price, discount);
    let subtotal = (total_price - discount_amount).max(Decimal::ZERO);
    let tax_amount = (subtotal * tax_rate / Decimal::ONE_HUNDRED).round_dp(2);
    let final_total = subtotal + tax_amount + delivery_fee;

    CartTotals {
        total_items,
        total_price,
        discount_amount,
        subtotal,
        tax_amount,
        final_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::cart_item::{Customization, CustomizationList};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn item(unit_price: Decimal, quantity: i32, extras: Vec<Decimal>) -> cart_item::Model {
        cart_item::Model {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            unit_price,
            customizations: CustomizationList(
                extras
                    .into_iter()
                    .map(|price| Customization {
                        option: "extra".into(),
                        value: "yes".into(),
                        additional_price: price,
                    })
                    .collect(),
            ),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_cart_is_all_zero() {
        let totals = compute_totals(&[], Discount::default(), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(totals, CartTotals::zero());
    }

    #[test]
    fn total_price_sums_line_totals_with_extras() {
        let items = vec![
            item(dec!(100.00), 2, vec![]),
            item(dec!(4.00), 3, vec![dec!(0.50), dec!(0.50)]),
        ];
        let totals = compute_totals(&items, Discount::default(), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(totals.total_items, 5);
        assert_eq!(totals.total_price, dec!(215.00)); // 200 + (4+1)*3
        assert_eq!(totals.final_total, dec!(215.00));
    }

    #[test]
    fn percentage_discount_wins_over_flat_amount() {
        let items = vec![item(dec!(100.00), 10, vec![])];
        let discount = Discount {
            amount: dec!(50.00),
            percentage: dec!(20),
        };
        let totals = compute_totals(&items, discount, Decimal::ZERO, Decimal::ZERO);
        assert_eq!(totals.total_price, dec!(1000.00));
        assert_eq!(totals.discount_amount, dec!(200.00));
        assert_eq!(totals.final_total, dec!(800.00));
    }

    #[test]
    fn flat_discount_used_when_no_percentage() {
        let items = vec![item(dec!(30.00), 1, vec![])];
        let discount = Discount {
            amount: dec!(5.00),
            percentage: Decimal::ZERO,
        };
        let totals = compute_totals(&items, discount, Decimal::ZERO, Decimal::ZERO);
        assert_eq!(totals.subtotal, dec!(25.00));
    }

    #[test]
    fn subtotal_clamped_at_zero_when_discount_exceeds_total() {
        let items = vec![item(dec!(10.00), 1, vec![])];
        let discount = Discount {
            amount: dec!(25.00),
            percentage: Decimal::ZERO,
        };
        let totals = compute_totals(&items, discount, dec!(10), dec!(2.00));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.final_total, dec!(2.00)); // delivery fee still applies
    }

    #[test]
    fn tax_applies_after_discount() {
        let items = vec![item(dec!(100.00), 1, vec![])];
        let discount = Discount {
            amount: dec!(20.00),
            percentage: Decimal::ZERO,
        };
        let totals = compute_totals(&items, discount, dec!(10), dec!(5.00));
        assert_eq!(totals.subtotal, dec!(80.00));
        assert_eq!(totals.tax_amount, dec!(8.00));
        assert_eq!(totals.final_total, dec!(93.00));
    }

    #[test]
    fn tax_rounds_to_cents() {
        let items = vec![item(dec!(9.99), 1, vec![])];
        let totals = compute_totals(&items, Discount::default(), dec!(8.25), Decimal::ZERO);
        // 9.99 * 8.25% = 0.824175 -> 0.82
        assert_eq!(totals.tax_amount, dec!(0.82));
    }
}
