//! Outbound checkout assembly.
//!
//! Builds the payment-creation request from cart state, signs it and hands it
//! to the external payment workflow exactly once. Payment creation is never
//! retried here: a timeout leaves the payment state unknown and the caller
//! has to start over.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::payment_split::PaymentSplitCalculator;
use super::signature::{CanonicalCheckout, CheckoutSigner};
use crate::cache::CompanyDirectory;
use crate::errors::{CheckoutFailure, ServiceError};
use crate::events::{Event, EventBus};
use crate::metrics::{PAYMENT_REQUESTS, PAYMENT_REQUEST_DURATION, PAYMENT_REQUEST_FAILURES};
use crate::models::money::{checked_sum, line_total};
use crate::models::{AffiliateSplitData, CartDiscount, CheckoutItem, PaymentSplit, ValidationError};
use crate::validation::{
    validate_input, validate_phone, validate_postal_code, validate_tax_document,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    #[validate(length(min = 1))]
    pub neighborhood: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(equal = 2))]
    pub state: String,
    #[validate(custom = "validate_postal_code")]
    pub postal_code: String,
}

/// Buyer data entered at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerData {
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom = "validate_tax_document")]
    pub cpf_cnpj: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[validate]
    pub address: Address,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_id: Option<String>,
    pub user_id: String,
    pub company_id: String,
    pub items: Vec<CheckoutItem>,
    pub customer: CustomerData,
    pub discount: Option<CartDiscount>,
    pub billing_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackUrls {
    pub success_url: String,
    pub cancel_url: String,
}

/// Body POSTed to the payment workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWorkflowRequest {
    pub order_id: String,
    pub user_id: String,
    pub company_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub product_list: Vec<CheckoutItem>,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub discount_amount: Option<Decimal>,
    pub customer: CustomerData,
    pub splits: Vec<PaymentSplit>,
    pub callback: CallbackUrls,
}

/// Successful payment creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCreated {
    pub checkout_url: String,
    pub order_id: String,
    #[serde(default)]
    pub asaas_payment_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowSuccess {
    success: bool,
    checkout_url: Option<String>,
    order_id: Option<String>,
    asaas_payment_id: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowError {
    error: Option<String>,
    message: Option<String>,
    code: Option<String>,
    error_type: Option<String>,
    order_id: Option<String>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Status reported when the workflow answers 2xx with `success: false`.
const REJECTED_WITHOUT_STATUS: u16 = 422;

#[derive(Clone)]
pub struct CheckoutOrchestrator {
    client: reqwest::Client,
    workflow_url: Option<String>,
    app_base_url: String,
    signer: CheckoutSigner,
    splits: PaymentSplitCalculator,
    companies: CompanyDirectory,
    events: EventBus,
}

impl CheckoutOrchestrator {
    pub fn new(
        workflow_url: Option<String>,
        timeout: Duration,
        app_base_url: impl Into<String>,
        signer: CheckoutSigner,
        splits: PaymentSplitCalculator,
        companies: CompanyDirectory,
        events: EventBus,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            workflow_url,
            app_base_url: app_base_url.into().trim_end_matches('/').to_string(),
            signer,
            splits,
            companies,
            events,
        })
    }

    /// Assembles, signs and submits one payment-creation request.
    #[instrument(skip(self, request), fields(company_id = %request.company_id, user_id = %request.user_id))]
    pub async fn submit(&self, request: CheckoutRequest) -> Result<CheckoutCreated, ServiceError> {
        let body = self.assemble(request).await?;
        let created = self.post(&body).await?;

        self.events.publish(Event::PaymentRequested {
            order_id: created.order_id.clone(),
            company_id: body.company_id.clone(),
            total_amount: body.total_amount,
        });
        Ok(created)
    }

    /// Builds the signed request body without sending it.
    pub async fn assemble(
        &self,
        request: CheckoutRequest,
    ) -> Result<PaymentWorkflowRequest, ServiceError> {
        validate_input(&request.customer)?;

        if request.company_id.trim().is_empty() || request.user_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "companyId and userId are required".to_string(),
            ));
        }
        if request.items.is_empty() {
            return Err(ServiceError::InvalidInput("Cart is empty".to_string()));
        }

        let mut items = Vec::with_capacity(request.items.len());
        for item in request.items {
            if item.product_id.trim().is_empty() || item.quantity <= 0 || item.unit_price < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(format!(
                    "Invalid cart line for product '{}'",
                    item.product_id
                )));
            }
            let total_price = line_total(item.unit_price, item.quantity).ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "Cart line for product '{}' is out of range",
                    item.product_id
                ))
            })?;
            items.push(CheckoutItem {
                total_price,
                ..item
            });
        }
        let subtotal = checked_sum(items.iter().map(|item| item.total_price))
            .ok_or_else(|| ServiceError::InvalidInput("Cart total is out of range".to_string()))?;

        let discount = request.discount.map(|discount| discount.reprice(subtotal));
        let total_amount = discount
            .as_ref()
            .map_or(subtotal, |discount| discount.final_total);

        let company = self
            .companies
            .company(&request.company_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Company {} not found", request.company_id))
            })?;
        let store_wallet = company.payout_wallet().ok_or_else(|| {
            ServiceError::InvalidOperation(format!(
                "Company {} has no payout wallet",
                company.id
            ))
        })?;

        let affiliate_split = discount
            .as_ref()
            .and_then(|discount| discount.affiliate.as_ref())
            .map(|affiliate| AffiliateSplitData {
                wallet_id: affiliate.wallet_id.clone(),
                commission_percentage: affiliate.commission_rate,
            });
        let splits = self.splits.calculate_payment_splits(
            total_amount,
            store_wallet,
            affiliate_split.as_ref(),
        )?;

        let canonical = CanonicalCheckout::new(&request.company_id, total_amount, &items);
        let signature = self.signer.sign(&canonical)?;

        let order_id = request
            .order_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let callback = CallbackUrls {
            success_url: format!("{}/checkout/success?orderId={}", self.app_base_url, order_id),
            cancel_url: format!("{}/checkout/cancel?orderId={}", self.app_base_url, order_id),
        };

        Ok(PaymentWorkflowRequest {
            order_id,
            user_id: request.user_id,
            company_id: request.company_id,
            total_amount,
            product_list: items,
            signature,
            billing_type: request.billing_type,
            coupon_code: discount.as_ref().map(|d| d.coupon.code.clone()),
            discount_amount: discount.as_ref().map(|d| d.discount_amount),
            customer: request.customer,
            splits: splits.splits,
            callback,
        })
    }

    async fn post(&self, body: &PaymentWorkflowRequest) -> Result<CheckoutCreated, ServiceError> {
        let url = self.workflow_url.as_deref().ok_or_else(|| {
            ServiceError::InvalidOperation("Payment workflow URL is not configured".to_string())
        })?;

        PAYMENT_REQUESTS.inc();
        let started = Instant::now();
        let outcome = self.exchange(url, body).await;
        PAYMENT_REQUEST_DURATION.observe(started.elapsed().as_secs_f64());

        match &outcome {
            Ok(created) => info!(order_id = %created.order_id, "payment checkout created"),
            Err(ServiceError::PaymentWorkflowTimeout) => {
                PAYMENT_REQUEST_FAILURES.with_label_values(&["timeout"]).inc();
                error!(order_id = %body.order_id, "payment workflow timed out; state unknown, not retrying");
            }
            Err(ServiceError::CheckoutRejected(failure)) => {
                PAYMENT_REQUEST_FAILURES.with_label_values(&["rejected"]).inc();
                warn!(order_id = %body.order_id, status = failure.status, error = %failure.error, "payment workflow rejected checkout");
            }
            Err(err) => {
                PAYMENT_REQUEST_FAILURES.with_label_values(&["transport"]).inc();
                error!(order_id = %body.order_id, error = %err, "payment workflow call failed");
            }
        }
        outcome
    }

    async fn exchange(
        &self,
        url: &str,
        body: &PaymentWorkflowRequest,
    ) -> Result<CheckoutCreated, ServiceError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            if let Ok(success) = serde_json::from_str::<WorkflowSuccess>(&text) {
                if success.success {
                    let checkout_url = success.checkout_url.ok_or_else(|| {
                        ServiceError::ExternalServiceError(
                            "Payment workflow answered without a checkout URL".to_string(),
                        )
                    })?;
                    return Ok(CheckoutCreated {
                        checkout_url,
                        order_id: success.order_id.unwrap_or_else(|| body.order_id.clone()),
                        asaas_payment_id: success.asaas_payment_id,
                        status: success.status,
                    });
                }
            }
        }

        let parsed = serde_json::from_str::<WorkflowError>(&text).ok();
        if status.is_success() && parsed.is_none() {
            return Err(ServiceError::ExternalServiceError(
                "Unreadable payment workflow response".to_string(),
            ));
        }
        let parsed = parsed.unwrap_or_default();
        let error = parsed
            .error
            .or(parsed.message)
            .unwrap_or_else(|| format!("PAYMENT_WORKFLOW_HTTP_{}", status.as_u16()));

        Err(ServiceError::CheckoutRejected(CheckoutFailure {
            status: if status.is_success() {
                REJECTED_WITHOUT_STATUS
            } else {
                status.as_u16()
            },
            code: parsed.code.or_else(|| Some(error.clone())),
            error,
            error_type: parsed.error_type,
            order_id: parsed.order_id.or_else(|| Some(body.order_id.clone())),
            errors: parsed
                .errors
                .into_iter()
                .filter_map(|value| serde_json::from_value::<ValidationError>(value).ok())
                .collect(),
        }))
    }
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::PaymentWorkflowTimeout
    } else {
        ServiceError::ExternalServiceError(err.to_string())
    }
}
