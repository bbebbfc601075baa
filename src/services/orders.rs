use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::checkout_validation::CheckoutValidator;
use super::coupons::CouponService;
use crate::errors::ServiceError;
use crate::events::{Event, EventBus};
use crate::metrics::ORDERS_COMMITTED;
use crate::models::{
    CheckoutPayload, CheckoutValidation, Order, OrderItem, OrderStatus, PaymentSplitResult,
};
use crate::store::{CommerceStore, NewOrder};

/// Result of placing an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum OrderPlacement {
    Placed {
        order: Order,
        items: Vec<OrderItem>,
        splits: PaymentSplitResult,
    },
    Rejected {
        validation: CheckoutValidation,
    },
}

/// Turns a validated checkout into a persisted order.
///
/// Validation runs first, but stock is checked again inside
/// [`CommerceStore::commit_order`], which is what makes the last unit safe
/// under concurrent checkouts.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn CommerceStore>,
    validator: CheckoutValidator,
    coupons: CouponService,
    events: EventBus,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn CommerceStore>,
        validator: CheckoutValidator,
        coupons: CouponService,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            validator,
            coupons,
            events,
        }
    }

    #[instrument(skip(self, payload), fields(company_id = ?payload.company_id))]
    pub async fn place_order(
        &self,
        payload: &CheckoutPayload,
    ) -> Result<OrderPlacement, ServiceError> {
        let validation = self.validator.validate_checkout_request(payload).await?;
        let Some(checkout) = validation.data.clone() else {
            return Ok(OrderPlacement::Rejected { validation });
        };

        let order_id = checkout
            .order_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let discount = checkout.discount.as_ref();

        let order = Order {
            id: order_id.clone(),
            user_id: checkout.user_id.clone(),
            company_id: checkout.company_id.clone(),
            subtotal: checkout.subtotal,
            discount_amount: discount.map_or(rust_decimal::Decimal::ZERO, |d| d.discount_amount),
            total_amount: checkout.final_total,
            coupon_id: discount.map(|d| d.coupon.id.clone()),
            affiliate_id: discount.and_then(|d| d.affiliate.as_ref().map(|a| a.id.clone())),
            status: OrderStatus::PendingPayment,
            created_at: Utc::now(),
        };
        let items: Vec<OrderItem> = checkout
            .items
            .iter()
            .enumerate()
            .map(|(line, item)| OrderItem {
                id: format!("{}-{}", order_id, line + 1),
                order_id: order_id.clone(),
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
            })
            .collect();

        let order = self
            .store
            .commit_order(NewOrder {
                order,
                items: items.clone(),
            })
            .await?;
        ORDERS_COMMITTED.inc();

        if let Some(coupon_id) = order.coupon_id.as_deref() {
            if let Err(err) = self.coupons.apply_coupon(coupon_id).await {
                error!(order_id = %order.id, coupon_id, error = %err, "coupon usage not recorded");
            }
        }

        info!(order_id = %order.id, total = %order.total_amount, "order committed");
        self.events.publish(Event::OrderCommitted {
            order_id: order.id.clone(),
            company_id: order.company_id.clone(),
            total_amount: order.total_amount,
        });

        Ok(OrderPlacement::Placed {
            order,
            items,
            splits: checkout.splits,
        })
    }
}
