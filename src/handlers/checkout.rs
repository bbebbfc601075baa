use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::{CheckoutFailure, ServiceError};
use crate::handlers::AppState;
use crate::models::money::{checked_sum, line_total};
use crate::models::{CheckoutItem, CheckoutPayload, CheckoutValidation, ValidationError};
use crate::services::checkout::{CheckoutRequest, CustomerData};
use crate::services::coupons::CouponVerdict;

/// Error body of the payment-workflow contract, shared by every checkout route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutErrorBody {
    pub success: bool,
    pub error: String,
    pub code: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub order_id: Option<String>,
    pub timestamp: String,
    pub errors: Vec<ValidationError>,
}

/// Renders a rejected validation with the status of its first error.
pub(crate) fn rejection_response(
    validation: CheckoutValidation,
    order_id: Option<String>,
) -> Response {
    let status = StatusCode::from_u16(validation.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
    let (code, error_type, message) = match validation.first_error() {
        Some(first) => (
            first.code.wire_code(),
            first.code.error_type(),
            Some(first.message.clone()),
        ),
        None => ("VALIDATION_ERROR", "VALIDATION", None),
    };
    let body = CheckoutErrorBody {
        success: false,
        error: code.to_string(),
        code: code.to_string(),
        error_type: error_type.to_string(),
        message,
        order_id,
        timestamp: chrono::Utc::now().to_rfc3339(),
        errors: validation.errors,
    };
    (status, Json(body)).into_response()
}

/// Relays a payment-workflow rejection to the caller unchanged.
pub(crate) fn failure_response(failure: CheckoutFailure) -> Response {
    let status = StatusCode::from_u16(failure.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = CheckoutErrorBody {
        success: false,
        code: failure.code.clone().unwrap_or_else(|| failure.error.clone()),
        error: failure.error,
        error_type: failure.error_type.unwrap_or_else(|| "BUSINESS".to_string()),
        message: None,
        order_id: failure.order_id,
        timestamp: chrono::Utc::now().to_rfc3339(),
        errors: failure.errors,
    };
    (status, Json(body)).into_response()
}

async fn validate_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutPayload>,
) -> Result<Response, ServiceError> {
    let validation = state
        .services
        .validator
        .validate_checkout_request(&payload)
        .await?;

    if validation.valid {
        Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "valid": true,
                "data": validation.data,
            })),
        )
            .into_response())
    } else {
        Ok(rejection_response(validation, payload.order_id))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    pub user_id: String,
    pub company_id: String,
    pub items: Vec<CheckoutItem>,
    pub customer: CustomerData,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub billing_type: Option<String>,
}

/// Assembles, signs and submits a payment-creation request.
async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutSessionRequest>,
) -> Result<Response, ServiceError> {
    let discount = match request
        .coupon_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
    {
        Some(code) => {
            let cart_total = request
                .items
                .iter()
                .map(|item| line_total(item.unit_price, item.quantity))
                .collect::<Option<Vec<_>>>()
                .and_then(checked_sum)
                .ok_or_else(|| {
                    ServiceError::InvalidInput("Cart total is out of range".to_string())
                })?;
            match state
                .services
                .coupons
                .evaluate(code, &request.company_id, cart_total)
                .await?
            {
                CouponVerdict::Accepted(discount) => Some(discount),
                CouponVerdict::Rejected(rejection) => {
                    let body = json!({
                        "success": false,
                        "error": rejection.code(),
                        "message": rejection.message(),
                    });
                    return Ok((StatusCode::CONFLICT, Json(body)).into_response());
                }
            }
        }
        None => None,
    };

    let outcome = state
        .services
        .orchestrator
        .submit(CheckoutRequest {
            order_id: request.order_id,
            user_id: request.user_id,
            company_id: request.company_id,
            items: request.items,
            customer: request.customer,
            discount,
            billing_type: request.billing_type,
        })
        .await;

    match outcome {
        Ok(created) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "checkoutUrl": created.checkout_url,
                "orderId": created.order_id,
                "asaasPaymentId": created.asaas_payment_id,
                "status": created.status,
            })),
        )
            .into_response()),
        Err(ServiceError::CheckoutRejected(failure)) => Ok(failure_response(failure)),
        Err(err) => Err(err),
    }
}

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(validate_checkout))
        .route("/sessions", post(create_checkout_session))
}
