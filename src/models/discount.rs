use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Affiliate, Coupon};

/// A coupon applied to a cart. Never persisted.
///
/// `final_total = original_total - discount_amount` and
/// `0 <= discount_amount <= original_total` hold for every value built by
/// [`CartDiscount::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartDiscount {
    pub coupon: Coupon,
    pub affiliate: Option<Affiliate>,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub original_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_total: Decimal,
}

impl CartDiscount {
    pub fn new(coupon: Coupon, affiliate: Option<Affiliate>, original_total: Decimal) -> Self {
        let discount_amount = coupon.discount_for(original_total);
        Self {
            coupon,
            affiliate,
            discount_amount,
            original_total,
            final_total: original_total - discount_amount,
        }
    }

    /// Recomputes the discount from the coupon definition for another cart total.
    pub fn reprice(&self, original_total: Decimal) -> Self {
        Self::new(self.coupon.clone(), self.affiliate.clone(), original_total)
    }

    pub fn affiliate_commission_rate(&self) -> Option<Decimal> {
        self.affiliate.as_ref().map(|affiliate| affiliate.commission_rate)
    }
}
