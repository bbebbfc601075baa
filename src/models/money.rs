//! Monetary helpers shared by the coupon evaluator, split calculator and
//! checkout validator.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Largest difference between two amounts that still counts as equal.
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

/// Rounds to cents, halves away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `round(total * percent / 100, 2)`
///
/// The rate is scaled first so the product never exceeds `total` for
/// percentages up to 100.
pub fn percent_of(total: Decimal, percent: Decimal) -> Decimal {
    round_money(total * (percent / dec!(100)))
}

/// `round(unit_price * quantity, 2)`, or `None` when the product does not fit
/// in a `Decimal`.
pub fn line_total(unit_price: Decimal, quantity: i64) -> Option<Decimal> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
}

/// Sum of `amounts`, or `None` on overflow.
pub fn checked_sum<I>(amounts: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
}

pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= AMOUNT_TOLERANCE
}

/// Formats an amount in Brazilian reais for user-facing messages.
pub fn format_brl(value: Decimal) -> String {
    format!("R$ {:.2}", round_money(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(10.004)), dec!(10.00));
    }

    #[test]
    fn percent_of_total() {
        assert_eq!(percent_of(dec!(200), dec!(10)), dec!(20));
        assert_eq!(percent_of(dec!(33.33), dec!(8)), dec!(2.67));
    }

    #[test]
    fn tolerance_is_inclusive() {
        assert!(amounts_match(dec!(100.00), dec!(100.01)));
        assert!(!amounts_match(dec!(100.00), dec!(100.02)));
    }

    #[test]
    fn line_total_rounds_and_reports_overflow() {
        assert_eq!(line_total(dec!(25.505), 2), Some(dec!(51.01)));
        assert_eq!(line_total(dec!(1000000000000), i64::MAX), None);
        assert_eq!(line_total(Decimal::MAX, 2), None);
    }

    #[test]
    fn checked_sum_reports_overflow() {
        assert_eq!(checked_sum([dec!(1.10), dec!(2.20)]), Some(dec!(3.30)));
        assert_eq!(checked_sum([Decimal::MAX, dec!(1)]), None);
        assert_eq!(checked_sum(Vec::new()), Some(Decimal::ZERO));
    }

    #[test]
    fn percent_of_huge_total_does_not_overflow() {
        assert_eq!(percent_of(Decimal::MAX, dec!(100)), round_money(Decimal::MAX));
    }

    #[test]
    fn formats_reais() {
        assert_eq!(format_brl(dec!(12.5)), "R$ 12.50");
    }
}
