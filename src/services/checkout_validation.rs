//! Server-side re-validation of an inbound checkout.
//!
//! Phases run in order and the pipeline stops after the first phase that
//! reports anything: shape, signature, company, items, coupon/affiliate,
//! total reconciliation. Prices always come from storage; what the client
//! submitted is only compared against them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::coupons::{CouponRejection, CouponService, CouponVerdict};
use super::payment_split::PaymentSplitCalculator;
use super::signature::{CanonicalCheckout, CheckoutSigner};
use crate::errors::ServiceError;
use crate::events::{Event, EventBus};
use crate::metrics::{record_checkout_rejection, CHECKOUT_VALIDATIONS};
use crate::models::money::{amounts_match, checked_sum, line_total};
use crate::models::{
    AffiliateSplitData, CartDiscount, CheckoutPayload, CheckoutValidation, Company, PricedItem,
    ValidatedCheckout, ValidationError, ValidationErrorCode as Code,
};
use crate::store::CommerceStore;

const FRAUD_TARGET: &str = "xeco_checkout::fraud";

/// Fields that passed the shape phase.
struct Shape<'a> {
    company_id: &'a str,
    user_id: &'a str,
    total_amount: Decimal,
}

#[derive(Clone)]
pub struct CheckoutValidator {
    store: Arc<dyn CommerceStore>,
    coupons: CouponService,
    signer: CheckoutSigner,
    splits: PaymentSplitCalculator,
    events: EventBus,
}

impl CheckoutValidator {
    pub fn new(
        store: Arc<dyn CommerceStore>,
        signer: CheckoutSigner,
        splits: PaymentSplitCalculator,
        events: EventBus,
    ) -> Self {
        Self {
            coupons: CouponService::new(store.clone(), events.clone()),
            store,
            signer,
            splits,
            events,
        }
    }

    pub async fn validate_checkout_request(
        &self,
        payload: &CheckoutPayload,
    ) -> Result<CheckoutValidation, ServiceError> {
        self.validate_at(payload, Utc::now()).await
    }

    /// Read-only: never writes to the store. Only infrastructure failures are
    /// returned as `Err`.
    #[instrument(skip(self, payload), fields(company_id = ?payload.company_id, order_id = ?payload.order_id))]
    pub async fn validate_at(
        &self,
        payload: &CheckoutPayload,
        now: DateTime<Utc>,
    ) -> Result<CheckoutValidation, ServiceError> {
        CHECKOUT_VALIDATIONS.inc();

        let outcome = self.run_phases(payload, now).await?;
        match outcome {
            Ok(data) => {
                debug!(final_total = %data.final_total, "checkout accepted");
                self.events.publish(Event::CheckoutValidated {
                    company_id: data.company_id.clone(),
                    final_total: data.final_total,
                });
                Ok(CheckoutValidation::accepted(data))
            }
            Err(errors) => {
                self.report_rejection(payload, &errors);
                Ok(CheckoutValidation::rejected(errors))
            }
        }
    }

    async fn run_phases(
        &self,
        payload: &CheckoutPayload,
        now: DateTime<Utc>,
    ) -> Result<Result<ValidatedCheckout, Vec<ValidationError>>, ServiceError> {
        let shape = match check_shape(payload) {
            Ok(shape) => shape,
            Err(errors) => return Ok(Err(errors)),
        };

        if let Some(error) = self.check_signature(payload, &shape)? {
            return Ok(Err(vec![error]));
        }

        let company = match self.check_company(shape.company_id).await? {
            Ok(company) => company,
            Err(error) => return Ok(Err(vec![error])),
        };

        let (items, subtotal) = match self.check_items(payload, shape.company_id).await? {
            Ok(priced) => priced,
            Err(errors) => return Ok(Err(errors)),
        };

        let discount = match payload.coupon() {
            Some(code) => match self.check_coupon(code, shape.company_id, subtotal, now).await? {
                Ok(discount) => Some(discount),
                Err(error) => return Ok(Err(vec![error])),
            },
            None => None,
        };

        let final_total = discount
            .as_ref()
            .map_or(subtotal, |discount| discount.final_total);
        if !amounts_match(shape.total_amount, final_total) {
            return Ok(Err(vec![ValidationError::new(
                Code::TotalMismatch,
                format!(
                    "Total informado ({}) difere do total calculado ({})",
                    shape.total_amount, final_total
                ),
            )
            .with_field("totalAmount")
            .with_details(json!({
                "submitted": shape.total_amount.to_string(),
                "expected": final_total.to_string(),
            }))]));
        }

        let store_wallet = company.payout_wallet().unwrap_or_default();
        let affiliate_split = discount
            .as_ref()
            .and_then(|discount| discount.affiliate.as_ref())
            .map(|affiliate| AffiliateSplitData {
                wallet_id: affiliate.wallet_id.clone(),
                commission_percentage: affiliate.commission_rate,
            });
        let splits = match self.splits.calculate_payment_splits(
            final_total,
            store_wallet,
            affiliate_split.as_ref(),
        ) {
            Ok(splits) => splits,
            Err(ServiceError::InvalidInput(reason)) => {
                let code = if affiliate_split.is_some() {
                    Code::AffiliateInvalid
                } else {
                    Code::InvalidTotal
                };
                return Ok(Err(vec![ValidationError::new(code, reason)]));
            }
            Err(other) => return Err(other),
        };

        Ok(Ok(ValidatedCheckout {
            order_id: payload.order_id.clone(),
            company_id: shape.company_id.to_string(),
            user_id: shape.user_id.to_string(),
            items,
            subtotal,
            discount,
            final_total,
            splits,
        }))
    }

    fn check_signature(
        &self,
        payload: &CheckoutPayload,
        shape: &Shape<'_>,
    ) -> Result<Option<ValidationError>, ServiceError> {
        let signature = payload
            .signature
            .as_deref()
            .map(str::trim)
            .filter(|signature| !signature.is_empty());
        let Some(signature) = signature else {
            return Ok(Some(
                ValidationError::new(Code::InvalidSignature, "Assinatura ausente")
                    .with_field("signature"),
            ));
        };

        let canonical = CanonicalCheckout::new(shape.company_id, shape.total_amount, &payload.items);
        if self.signer.verify(&canonical, signature)? {
            Ok(None)
        } else {
            Ok(Some(
                ValidationError::new(Code::InvalidSignature, "Assinatura inválida")
                    .with_field("signature"),
            ))
        }
    }

    async fn check_company(
        &self,
        company_id: &str,
    ) -> Result<Result<Company, ValidationError>, ServiceError> {
        let Some(company) = self.store.get_company(company_id).await? else {
            return Ok(Err(ValidationError::new(
                Code::CompanyNotFound,
                "Loja não encontrada",
            )
            .with_field("companyId")));
        };
        if !company.active {
            return Ok(Err(ValidationError::new(
                Code::CompanyInactive,
                "Loja inativa",
            )
            .with_field("companyId")));
        }
        if company.payout_wallet().is_none() {
            return Ok(Err(ValidationError::new(
                Code::NoWallet,
                "Loja sem carteira de pagamento configurada",
            )
            .with_field("companyId")));
        }
        Ok(Ok(company))
    }

    /// Checks every line and collects every problem before returning.
    async fn check_items(
        &self,
        payload: &CheckoutPayload,
        company_id: &str,
    ) -> Result<Result<(Vec<PricedItem>, Decimal), Vec<ValidationError>>, ServiceError> {
        let mut requested: HashMap<&str, i64> = HashMap::new();
        for item in &payload.items {
            if item.quantity > 0 {
                let wanted = requested.entry(item.product_id.as_str()).or_insert(0);
                *wanted = wanted.saturating_add(item.quantity);
            }
        }

        let mut errors = Vec::new();
        let mut priced = Vec::with_capacity(payload.items.len());

        for (index, item) in payload.items.iter().enumerate() {
            let field = format!("items[{}]", index);

            if item.product_id.trim().is_empty()
                || item.quantity <= 0
                || item.unit_price < Decimal::ZERO
            {
                errors.push(
                    ValidationError::new(
                        Code::InvalidItem,
                        "Item precisa de produto, quantidade positiva e preço não negativo",
                    )
                    .with_field(field),
                );
                continue;
            }
            let Some(submitted_line) = line_total(item.unit_price, item.quantity) else {
                errors.push(
                    ValidationError::new(
                        Code::InvalidItem,
                        "Quantidade ou preço do item fora do limite",
                    )
                    .with_field(field),
                );
                continue;
            };

            let Some(product) = self.store.get_product(&item.product_id).await? else {
                errors.push(
                    ValidationError::new(
                        Code::ProductNotFound,
                        format!("Produto {} não encontrado", item.product_id),
                    )
                    .with_field(field),
                );
                continue;
            };

            if product.company_id != company_id {
                errors.push(
                    ValidationError::new(
                        Code::ProductNotFromCompany,
                        format!("Produto {} não pertence a esta loja", product.name),
                    )
                    .with_field(field),
                );
                continue;
            }

            if !product.active {
                errors.push(
                    ValidationError::new(
                        Code::ProductInactive,
                        format!("Produto {} não está disponível", product.name),
                    )
                    .with_field(field),
                );
                continue;
            }

            let wanted = requested
                .get(item.product_id.as_str())
                .copied()
                .unwrap_or(item.quantity);
            if product.stock < wanted {
                errors.push(
                    ValidationError::new(
                        Code::OutOfStock,
                        format!(
                            "Estoque insuficiente para {}: {} disponível(is)",
                            product.name, product.stock
                        ),
                    )
                    .with_field(field.clone())
                    .with_details(json!({ "available": product.stock, "requested": wanted })),
                );
            }

            if item.unit_price.normalize() != product.price.normalize() {
                errors.push(
                    ValidationError::new(
                        Code::PriceMismatch,
                        format!("Preço de {} foi alterado", product.name),
                    )
                    .with_field(field.clone())
                    .with_details(json!({
                        "submitted": item.unit_price.to_string(),
                        "expected": product.price.to_string(),
                    })),
                );
            }

            if !amounts_match(item.total_price, submitted_line) {
                errors.push(
                    ValidationError::new(
                        Code::ItemTotalMismatch,
                        format!("Total do item {} não confere", product.name),
                    )
                    .with_field(field.clone())
                    .with_details(json!({
                        "submitted": item.total_price.to_string(),
                        "expected": submitted_line.to_string(),
                    })),
                );
            }

            let Some(stored_line) = line_total(product.price, item.quantity) else {
                errors.push(
                    ValidationError::new(
                        Code::InvalidItem,
                        "Quantidade ou preço do item fora do limite",
                    )
                    .with_field(field),
                );
                continue;
            };
            priced.push(PricedItem {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                quantity: item.quantity,
                unit_price: product.price,
                total_price: stored_line,
            });
        }

        if !errors.is_empty() {
            return Ok(Err(errors));
        }
        let Some(subtotal) = checked_sum(priced.iter().map(|item| item.total_price)) else {
            return Ok(Err(vec![ValidationError::new(
                Code::InvalidTotal,
                "Total do carrinho fora do limite",
            )
            .with_field("items")]));
        };
        Ok(Ok((priced, subtotal)))
    }

    async fn check_coupon(
        &self,
        code: &str,
        company_id: &str,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Result<CartDiscount, ValidationError>, ServiceError> {
        let verdict = self.coupons.evaluate_at(code, company_id, subtotal, now).await?;
        Ok(match verdict {
            CouponVerdict::Accepted(discount) => Ok(discount),
            CouponVerdict::Rejected(rejection) => {
                let code_for = match &rejection {
                    CouponRejection::Affiliate(_) => Code::AffiliateInvalid,
                    _ => Code::CouponInvalid,
                };
                Err(ValidationError::new(code_for, rejection.message())
                    .with_field("couponCode")
                    .with_details(json!({ "reason": rejection.code() })))
            }
        })
    }

    fn report_rejection(&self, payload: &CheckoutPayload, errors: &[ValidationError]) {
        for error in errors {
            let integrity = error.code.is_integrity_signal();
            record_checkout_rejection(error.code.wire_code(), integrity);
            if integrity {
                warn!(
                    target: FRAUD_TARGET,
                    code = error.code.wire_code(),
                    company_id = ?payload.company_id,
                    user_id = ?payload.user_id,
                    order_id = ?payload.order_id,
                    field = ?error.field,
                    details = ?error.details,
                    "checkout integrity check failed"
                );
            }
        }
        debug!(
            errors = errors.len(),
            first = ?errors.first().map(|e| e.code),
            "checkout rejected"
        );
        self.events.publish(Event::CheckoutRejected {
            company_id: payload.company_id.clone(),
            codes: errors
                .iter()
                .map(|error| error.code.wire_code().to_string())
                .collect(),
        });
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn check_shape(payload: &CheckoutPayload) -> Result<Shape<'_>, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let company_id = non_blank(payload.company_id.as_ref());
    if company_id.is_none() {
        errors.push(
            ValidationError::new(Code::InvalidCompanyId, "companyId é obrigatório")
                .with_field("companyId"),
        );
    }

    let user_id = non_blank(payload.user_id.as_ref());
    if user_id.is_none() {
        errors.push(
            ValidationError::new(Code::InvalidUserId, "userId é obrigatório").with_field("userId"),
        );
    }

    if payload.items.is_empty() {
        errors.push(ValidationError::new(Code::EmptyCart, "Carrinho vazio").with_field("items"));
    }

    let total_amount = payload.total_amount.filter(|total| *total > Decimal::ZERO);
    if total_amount.is_none() {
        errors.push(
            ValidationError::new(Code::InvalidTotal, "totalAmount deve ser positivo")
                .with_field("totalAmount"),
        );
    }

    match (company_id, user_id, total_amount) {
        (Some(company_id), Some(user_id), Some(total_amount)) if errors.is_empty() => Ok(Shape {
            company_id,
            user_id,
            total_amount,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn shape_collects_every_missing_field() {
        let errors = match check_shape(&CheckoutPayload::default()) {
            Err(errors) => errors,
            Ok(_) => panic!("empty payload passed the shape phase"),
        };
        let codes: Vec<Code> = errors.iter().map(|e| e.code).collect();
        assert_eq!(
            codes,
            vec![
                Code::InvalidCompanyId,
                Code::InvalidUserId,
                Code::EmptyCart,
                Code::InvalidTotal
            ]
        );
    }

    #[test]
    fn blank_ids_and_non_positive_total_fail_shape() {
        let payload = CheckoutPayload {
            company_id: Some("  ".into()),
            user_id: Some("u1".into()),
            total_amount: Some(dec!(0)),
            items: vec![Default::default()],
            ..Default::default()
        };
        let errors = match check_shape(&payload) {
            Err(errors) => errors,
            Ok(_) => panic!("blank company passed the shape phase"),
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].code, Code::InvalidCompanyId);
        assert_eq!(errors[1].code, Code::InvalidTotal);
    }
}
