//! HMAC-SHA256 signatures over the pricing-relevant part of a checkout.
//!
//! Only `{companyId, totalAmount, items[{productId, quantity, unitPrice}]}` is
//! signed, serialized as compact JSON with fields in that order. Whole amounts
//! are written as integers (`100`, not `100.0`) so both sides of the exchange
//! produce the same bytes.

use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use sha2::Sha256;

use crate::errors::ServiceError;
use crate::models::CheckoutItem;

type HmacSha256 = Hmac<Sha256>;

fn serialize_amount<S: Serializer>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    let normalized = amount.normalize();
    if normalized.fract().is_zero() {
        if let Some(whole) = normalized.to_i64() {
            return serializer.serialize_i64(whole);
        }
    }
    match normalized.to_f64() {
        Some(value) => serializer.serialize_f64(value),
        None => Err(serde::ser::Error::custom("amount out of range")),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalItem {
    pub product_id: String,
    pub quantity: i64,
    #[serde(serialize_with = "serialize_amount")]
    pub unit_price: Decimal,
}

/// The signed surface of a checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalCheckout {
    pub company_id: String,
    #[serde(serialize_with = "serialize_amount")]
    pub total_amount: Decimal,
    pub items: Vec<CanonicalItem>,
}

impl CanonicalCheckout {
    pub fn new(company_id: &str, total_amount: Decimal, items: &[CheckoutItem]) -> Self {
        Self {
            company_id: company_id.to_string(),
            total_amount,
            items: items
                .iter()
                .map(|item| CanonicalItem {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ServiceError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Clone)]
pub struct CheckoutSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for CheckoutSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSigner").finish_non_exhaustive()
    }
}

impl CheckoutSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, canonical: &CanonicalCheckout) -> Result<HmacSha256, ServiceError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ServiceError::InternalError(format!("HMAC key rejected: {}", e)))?;
        mac.update(&canonical.to_bytes()?);
        Ok(mac)
    }

    /// Lower-case hex HMAC of the canonical payload.
    pub fn sign(&self, canonical: &CanonicalCheckout) -> Result<String, ServiceError> {
        Ok(hex::encode(self.mac(canonical)?.finalize().into_bytes()))
    }

    /// Constant-time comparison of `signature` against a fresh signature of
    /// `canonical`. Malformed hex never verifies.
    pub fn verify(&self, canonical: &CanonicalCheckout, signature: &str) -> Result<bool, ServiceError> {
        let Ok(provided) = hex::decode(signature.trim()) else {
            return Ok(false);
        };
        Ok(self.mac(canonical)?.verify_slice(&provided).is_ok())
    }
}
