use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::affiliates::{check_affiliate, AffiliateRejection};
use crate::errors::ServiceError;
use crate::events::{Event, EventBus};
use crate::metrics::{COUPONS_APPLIED, COUPON_REJECTIONS, COUPON_VALIDATIONS};
use crate::models::money::format_brl;
use crate::models::{Affiliate, CartDiscount, Coupon};
use crate::store::CommerceStore;

/// Why a coupon cannot be used on a cart.
#[derive(Debug, Clone, PartialEq)]
pub enum CouponRejection {
    NotFound,
    Inactive,
    Expired { expires_at: DateTime<Utc> },
    UsageLimitReached,
    WrongCompany,
    BelowMinimum { minimum: Decimal, shortfall: Decimal },
    Affiliate(AffiliateRejection),
}

impl CouponRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Inactive => "INACTIVE",
            Self::Expired { .. } => "EXPIRED",
            Self::UsageLimitReached => "USAGE_LIMIT_REACHED",
            Self::WrongCompany => "WRONG_COMPANY",
            Self::BelowMinimum { .. } => "BELOW_MINIMUM",
            Self::Affiliate(rejection) => rejection.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::NotFound => "Cupom não encontrado".to_string(),
            Self::Inactive => "Este cupom não é mais válido".to_string(),
            Self::Expired { expires_at } => {
                format!("Este cupom expirou em {}", expires_at.format("%d/%m/%Y"))
            }
            Self::UsageLimitReached => "Este cupom atingiu o limite de usos".to_string(),
            Self::WrongCompany => "Este cupom não é válido para os itens do seu carrinho".to_string(),
            Self::BelowMinimum { minimum, shortfall } => format!(
                "Pedido mínimo de {} para este cupom. Faltam {}",
                format_brl(*minimum),
                format_brl(*shortfall)
            ),
            Self::Affiliate(rejection) => rejection.message().to_string(),
        }
    }
}

/// Checks the coupon's own terms, in order, against a cart of `company_id`
/// worth `cart_total`. Affiliate checks are separate since they need a lookup.
pub fn check_coupon_terms(
    coupon: &Coupon,
    company_id: &str,
    cart_total: Decimal,
    now: DateTime<Utc>,
) -> Result<(), CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.is_expired_at(now) {
        if let Some(expires_at) = coupon.expires_at {
            return Err(CouponRejection::Expired { expires_at });
        }
    }
    if coupon.usage_exhausted() {
        return Err(CouponRejection::UsageLimitReached);
    }
    if coupon.company_id != company_id {
        return Err(CouponRejection::WrongCompany);
    }
    if let Some(minimum) = coupon.min_order_value {
        if cart_total < minimum {
            return Err(CouponRejection::BelowMinimum {
                minimum,
                shortfall: minimum - cart_total,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum CouponVerdict {
    Accepted(CartDiscount),
    Rejected(CouponRejection),
}

impl CouponVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn discount(&self) -> Option<&CartDiscount> {
        match self {
            Self::Accepted(discount) => Some(discount),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&CouponRejection> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Wire shape of a coupon check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponValidationResponse {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<Coupon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliate: Option<Affiliate>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub discount_amount: Option<Decimal>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub final_total: Option<Decimal>,
}

impl From<CouponVerdict> for CouponValidationResponse {
    fn from(verdict: CouponVerdict) -> Self {
        match verdict {
            CouponVerdict::Accepted(discount) => Self {
                valid: true,
                message: "Cupom aplicado com sucesso".to_string(),
                code: None,
                discount_amount: Some(discount.discount_amount),
                final_total: Some(discount.final_total),
                coupon: Some(discount.coupon),
                affiliate: discount.affiliate,
            },
            CouponVerdict::Rejected(rejection) => Self {
                valid: false,
                message: rejection.message(),
                code: Some(rejection.code().to_string()),
                coupon: None,
                affiliate: None,
                discount_amount: None,
                final_total: None,
            },
        }
    }
}

/// Coupon/discount evaluator. Validation is read-only; usage is only counted
/// by [`CouponService::apply_coupon`].
#[derive(Clone)]
pub struct CouponService {
    store: Arc<dyn CommerceStore>,
    events: EventBus,
}

impl CouponService {
    pub fn new(store: Arc<dyn CommerceStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    pub async fn evaluate(
        &self,
        code: &str,
        company_id: &str,
        cart_total: Decimal,
    ) -> Result<CouponVerdict, ServiceError> {
        self.evaluate_at(code, company_id, cart_total, Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn evaluate_at(
        &self,
        code: &str,
        company_id: &str,
        cart_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<CouponVerdict, ServiceError> {
        COUPON_VALIDATIONS.inc();

        let verdict = self.judge(code, company_id, cart_total, now).await?;
        if let CouponVerdict::Rejected(ref rejection) = verdict {
            COUPON_REJECTIONS.with_label_values(&[rejection.code()]).inc();
            debug!(code, company_id, reason = rejection.code(), "coupon rejected");
        }
        Ok(verdict)
    }

    async fn judge(
        &self,
        code: &str,
        company_id: &str,
        cart_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<CouponVerdict, ServiceError> {
        let Some(coupon) = self.find_coupon(code, company_id).await? else {
            return Ok(CouponVerdict::Rejected(CouponRejection::NotFound));
        };

        if let Err(rejection) = check_coupon_terms(&coupon, company_id, cart_total, now) {
            return Ok(CouponVerdict::Rejected(rejection));
        }

        if coupon.has_inconsistent_kind() {
            warn!(
                coupon_id = %coupon.id,
                kind = ?coupon.kind,
                affiliate_id = ?coupon.affiliate_id,
                "coupon type disagrees with affiliate_id; affiliate_id wins"
            );
        }

        let affiliate = match coupon.referring_affiliate() {
            Some(affiliate_id) => {
                let affiliate = self.store.get_affiliate(affiliate_id).await?;
                if let Err(rejection) = check_affiliate(affiliate.as_ref(), company_id) {
                    return Ok(CouponVerdict::Rejected(CouponRejection::Affiliate(rejection)));
                }
                affiliate
            }
            None => None,
        };

        Ok(CouponVerdict::Accepted(CartDiscount::new(
            coupon, affiliate, cart_total,
        )))
    }

    /// Finds a coupon by code, preferring the one issued by `company_id`
    /// when several stores share a code.
    async fn find_coupon(
        &self,
        code: &str,
        company_id: &str,
    ) -> Result<Option<Coupon>, ServiceError> {
        let normalized = code.trim().to_uppercase();
        if normalized.is_empty() {
            return Ok(None);
        }
        let mut candidates = self.store.find_coupons_by_code(&normalized).await?;
        let preferred = candidates
            .iter()
            .position(|coupon| coupon.company_id == company_id)
            .unwrap_or(0);
        Ok(if candidates.is_empty() {
            None
        } else {
            Some(candidates.swap_remove(preferred))
        })
    }

    pub async fn validate_coupon(
        &self,
        code: &str,
        company_id: &str,
        cart_total: Decimal,
    ) -> Result<CouponValidationResponse, ServiceError> {
        Ok(self.evaluate(code, company_id, cart_total).await?.into())
    }

    /// Records one use of a coupon after a successful purchase. Returns the new
    /// usage count.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, coupon_id: &str) -> Result<i64, ServiceError> {
        let used_count = self.store.increment_coupon_usage(coupon_id).await?;
        COUPONS_APPLIED.inc();
        info!(coupon_id, used_count, "coupon usage recorded");
        self.events.publish(Event::CouponApplied {
            coupon_id: coupon_id.to_string(),
            used_count,
        });
        Ok(used_count)
    }
}
