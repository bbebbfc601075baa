use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CartDiscount, PaymentSplitResult};

/// Inbound checkout request as it arrives on the wire. Every field is
/// optional here so that shape problems surface as validation errors instead
/// of deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub total_amount: Option<Decimal>,
    #[serde(default, alias = "productList")]
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

impl CheckoutPayload {
    /// The coupon code, when one was submitted and is not blank.
    pub fn coupon(&self) -> Option<&str> {
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    #[serde(default)]
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float", default)]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float", default)]
    pub total_price: Decimal,
}

/// Stable error codes emitted by the checkout validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    InvalidPayload,
    InvalidCompanyId,
    InvalidUserId,
    EmptyCart,
    InvalidTotal,
    InvalidItem,
    InvalidSignature,
    CompanyNotFound,
    CompanyInactive,
    NoWallet,
    ProductNotFound,
    ProductInactive,
    ProductNotFromCompany,
    OutOfStock,
    PriceMismatch,
    ItemTotalMismatch,
    CouponInvalid,
    AffiliateInvalid,
    TotalMismatch,
    #[serde(other)]
    Unknown,
}

impl ValidationErrorCode {
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidPayload
            | Self::InvalidCompanyId
            | Self::InvalidUserId
            | Self::EmptyCart
            | Self::InvalidTotal
            | Self::InvalidItem
            | Self::TotalMismatch
            | Self::Unknown => 400,
            Self::InvalidSignature => 403,
            Self::CompanyNotFound => 404,
            Self::CompanyInactive
            | Self::NoWallet
            | Self::ProductNotFound
            | Self::ProductInactive
            | Self::ProductNotFromCompany
            | Self::OutOfStock
            | Self::PriceMismatch
            | Self::ItemTotalMismatch
            | Self::CouponInvalid
            | Self::AffiliateInvalid => 409,
        }
    }

    /// Code as published on the payment-workflow error contract.
    pub fn wire_code(self) -> &'static str {
        match self {
            Self::InvalidPayload => "MISSING_FIELD",
            Self::InvalidCompanyId => "INVALID_COMPANY_ID",
            Self::InvalidUserId => "INVALID_USER_ID",
            Self::EmptyCart => "EMPTY_CART",
            Self::InvalidTotal => "INVALID_TOTAL",
            Self::InvalidItem => "INVALID_ITEM",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::CompanyNotFound => "COMPANY_NOT_FOUND",
            Self::CompanyInactive => "COMPANY_INACTIVE",
            Self::NoWallet => "NO_WALLET",
            Self::ProductNotFound => "PRODUCT:NOT_FOUND",
            Self::ProductInactive => "PRODUCT:INACTIVE",
            Self::ProductNotFromCompany => "PRODUCT:NOT_FROM_COMPANY",
            Self::OutOfStock => "INSUFFICIENT_STOCK",
            Self::PriceMismatch => "PRICE_MISMATCH",
            Self::ItemTotalMismatch => "ITEM_TOTAL_MISMATCH",
            Self::CouponInvalid => "COUPON_INVALID",
            Self::AffiliateInvalid => "AFFILIATE_INVALID",
            Self::TotalMismatch => "TOTAL_MISMATCH",
            Self::Unknown => "VALIDATION_ERROR",
        }
    }

    /// Tampering indicators, reported apart from ordinary validation failures.
    pub fn is_integrity_signal(self) -> bool {
        matches!(
            self,
            Self::InvalidSignature | Self::PriceMismatch | Self::ItemTotalMismatch | Self::TotalMismatch
        )
    }

    pub fn error_type(self) -> &'static str {
        if self.is_integrity_signal() {
            "SECURITY"
        } else if self.http_status() == 400 {
            "VALIDATION"
        } else {
            "BUSINESS"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub code: ValidationErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ValidationError {
    pub fn new(code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// A cart line re-priced from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

/// Server-side view of an accepted checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedCheckout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub company_id: String,
    pub user_id: String,
    pub items: Vec<PricedItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    pub discount: Option<CartDiscount>,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_total: Decimal,
    pub splits: PaymentSplitResult,
}

/// Outcome of a checkout pre-flight check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutValidation {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ValidatedCheckout>,
}

impl CheckoutValidation {
    pub fn accepted(data: ValidatedCheckout) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            data: Some(data),
        }
    }

    pub fn rejected(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: false,
            errors,
            data: None,
        }
    }

    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    pub fn has_error(&self, code: ValidationErrorCode) -> bool {
        self.errors.iter().any(|error| error.code == code)
    }

    /// HTTP status for the verdict: 200 when valid, otherwise the status of
    /// the first error.
    pub fn http_status(&self) -> u16 {
        self.first_error()
            .map_or(200, |error| error.code.http_status())
    }
}
