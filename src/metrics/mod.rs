//! Prometheus metrics for the checkout core, exposed at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use tracing::trace;

lazy_static! {
    pub static ref COUPON_VALIDATIONS: IntCounter = register_int_counter!(
        "coupon_validations_total",
        "Total number of coupon validations"
    ).unwrap();

    pub static ref COUPON_REJECTIONS: IntCounterVec = register_int_counter_vec!(
        "coupon_rejections_total",
        "Coupon validations that failed, by reason",
        &["reason"]
    ).unwrap();

    pub static ref COUPONS_APPLIED: IntCounter = register_int_counter!(
        "coupons_applied_total",
        "Coupon usages recorded after a purchase"
    ).unwrap();

    pub static ref CHECKOUT_VALIDATIONS: IntCounter = register_int_counter!(
        "checkout_validations_total",
        "Total number of checkout pre-flight validations"
    ).unwrap();

    pub static ref CHECKOUT_REJECTIONS: IntCounterVec = register_int_counter_vec!(
        "checkout_rejections_total",
        "Checkout validation errors, by code",
        &["code"]
    ).unwrap();

    pub static ref FRAUD_SIGNALS: IntCounterVec = register_int_counter_vec!(
        "fraud_signals_total",
        "Signature, price and total mismatches seen during validation",
        &["code"]
    ).unwrap();

    pub static ref ORDERS_COMMITTED: IntCounter = register_int_counter!(
        "orders_committed_total",
        "Orders committed with their stock decrement"
    ).unwrap();

    pub static ref PAYMENT_REQUESTS: IntCounter = register_int_counter!(
        "payment_workflow_requests_total",
        "Payment-creation requests sent to the payment workflow"
    ).unwrap();

    pub static ref PAYMENT_REQUEST_FAILURES: IntCounterVec = register_int_counter_vec!(
        "payment_workflow_failures_total",
        "Failed payment-creation requests, by kind",
        &["kind"]
    ).unwrap();

    pub static ref PAYMENT_REQUEST_DURATION: Histogram = register_histogram!(
        "payment_workflow_request_duration_seconds",
        "Latency of payment-workflow calls in seconds"
    ).unwrap();

    pub static ref INVITATIONS_ACCEPTED: IntCounter = register_int_counter!(
        "affiliate_invitations_accepted_total",
        "Affiliate invitations confirmed"
    ).unwrap();

    pub static ref INVITATIONS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "affiliate_invitations_rejected_total",
        "Affiliate invitation confirmations that failed, by reason",
        &["reason"]
    ).unwrap();

    pub static ref CACHE_HITS: IntCounter = register_int_counter!(
        "cache_hits_total",
        "Total number of cache hits"
    ).unwrap();

    pub static ref CACHE_MISSES: IntCounter = register_int_counter!(
        "cache_misses_total",
        "Total number of cache misses"
    ).unwrap();
}

pub fn record_checkout_rejection(code: &str, integrity_signal: bool) {
    CHECKOUT_REJECTIONS.with_label_values(&[code]).inc();
    if integrity_signal {
        FRAUD_SIGNALS.with_label_values(&[code]).inc();
    }
    trace!(code, integrity_signal, "recorded checkout rejection");
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
