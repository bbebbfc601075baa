use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::money::percent_of;

/// How a coupon's `discount_value` is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
    #[serde(other)]
    Unknown,
}

impl From<&str> for DiscountType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "percentage" => DiscountType::Percentage,
            "fixed" => DiscountType::Fixed,
            _ => DiscountType::Unknown,
        }
    }
}

/// Denormalized coupon origin. Display hint only: `affiliate_id` decides
/// whether a coupon is an affiliate coupon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponKind {
    #[sea_orm(string_value = "COMPANY")]
    Company,
    #[sea_orm(string_value = "AFFILIATE")]
    Affiliate,
}

/// A discount code scoped to one company (`coupons` collection).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Stored upper-case.
    pub code: String,
    pub company_id: String,
    pub affiliate_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<CouponKind>,
    /// "percentage" or "fixed"; anything else yields no discount.
    pub discount_type: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_value: Decimal,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub min_order_value: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn discount_kind(&self) -> DiscountType {
        DiscountType::from(self.discount_type.as_str())
    }

    /// The referring affiliate, when the coupon carries a non-blank `affiliate_id`.
    pub fn referring_affiliate(&self) -> Option<&str> {
        self.affiliate_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn is_affiliate_coupon(&self) -> bool {
        self.referring_affiliate().is_some()
    }

    /// True when `kind` disagrees with `affiliate_id`.
    pub fn has_inconsistent_kind(&self) -> bool {
        match self.kind {
            Some(CouponKind::Affiliate) => !self.is_affiliate_coupon(),
            Some(CouponKind::Company) => self.is_affiliate_coupon(),
            None => false,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires_at| expires_at < now)
    }

    pub fn usage_exhausted(&self) -> bool {
        self.max_uses.map_or(false, |max| self.used_count >= max)
    }

    /// Discount this coupon grants on `cart_total`, always within `0..=cart_total`.
    pub fn discount_for(&self, cart_total: Decimal) -> Decimal {
        if cart_total <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let raw = match self.discount_kind() {
            DiscountType::Percentage => percent_of(cart_total, self.discount_value),
            DiscountType::Fixed => self.discount_value.min(cart_total),
            DiscountType::Unknown => Decimal::ZERO,
        };
        raw.max(Decimal::ZERO).min(cart_total)
    }
}
