use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::models::{AffiliateSplitData, PaymentSplitResult, SplitAllocation};
use crate::ApiResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub store_wallet_id: String,
    #[serde(default)]
    pub affiliate: Option<AffiliateSplitData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResponse {
    #[serde(flatten)]
    pub result: PaymentSplitResult,
    pub allocations: Vec<SplitAllocation>,
}

async fn calculate_splits(
    State(state): State<AppState>,
    Json(request): Json<SplitRequest>,
) -> Result<Json<ApiResponse<SplitResponse>>, ServiceError> {
    let result = state.services.splits.calculate_payment_splits(
        request.total_amount,
        &request.store_wallet_id,
        request.affiliate.as_ref(),
    )?;
    let allocations = result.allocate();
    Ok(Json(ApiResponse::success(SplitResponse {
        result,
        allocations,
    })))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/splits", post(calculate_splits))
}
