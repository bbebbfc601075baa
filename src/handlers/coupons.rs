use axum::{
    extract::{Json, Path, State},
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::coupons::CouponValidationResponse;
use crate::ApiResponse;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1))]
    pub company_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub cart_total: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponApplied {
    pub coupon_id: String,
    pub used_count: i64,
}

/// Checks a coupon against a cart. A rejected coupon is a normal `200` with
/// `valid: false`; only infrastructure failures produce an error status.
async fn validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<CouponValidationResponse>, ServiceError> {
    request.validate()?;
    if request.cart_total < Decimal::ZERO {
        return Err(ServiceError::InvalidInput(
            "cartTotal must not be negative".to_string(),
        ));
    }

    let response = state
        .services
        .coupons
        .validate_coupon(&request.code, &request.company_id, request.cart_total)
        .await?;
    Ok(Json(response))
}

/// Records one use of a coupon after a purchase went through.
async fn apply_coupon(
    State(state): State<AppState>,
    Path(coupon_id): Path<String>,
) -> Result<Json<ApiResponse<CouponApplied>>, ServiceError> {
    let used_count = state.services.coupons.apply_coupon(&coupon_id).await?;
    Ok(Json(ApiResponse::success(CouponApplied {
        coupon_id,
        used_count,
    })))
}

pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(validate_coupon))
        .route("/:coupon_id/apply", post(apply_coupon))
}
