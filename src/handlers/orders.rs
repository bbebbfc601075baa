use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::checkout::rejection_response;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::models::CheckoutPayload;
use crate::services::orders::OrderPlacement;
use crate::ApiResponse;

/// Validates a checkout and commits the order with its stock decrement.
async fn place_order(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutPayload>,
) -> Result<Response, ServiceError> {
    match state.services.orders.place_order(&payload).await? {
        OrderPlacement::Placed {
            order,
            items,
            splits,
        } => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(json!({
                "order": order,
                "items": items,
                "splits": splits,
            }))),
        )
            .into_response()),
        OrderPlacement::Rejected { validation } => {
            Ok(rejection_response(validation, payload.order_id))
        }
    }
}

async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Response, ServiceError> {
    let (order, items) = state
        .store
        .get_order(&order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
    Ok(Json(ApiResponse::success(json!({ "order": order, "items": items }))).into_response())
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order))
        .route("/:order_id", get(get_order))
}
