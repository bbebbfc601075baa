//! Domain events and the subscription contract.
//!
//! Listeners call [`EventBus::subscribe`] and receive a [`Subscription`]; they
//! must keep it alive for as long as they want events and call
//! [`Subscription::dispose`] (or drop it) on teardown. Delivery is
//! at-least-once for the latest events: a listener that falls behind skips
//! to the newest events rather than failing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    CouponApplied {
        coupon_id: String,
        used_count: i64,
    },
    CheckoutValidated {
        company_id: String,
        final_total: Decimal,
    },
    CheckoutRejected {
        company_id: Option<String>,
        codes: Vec<String>,
    },
    PaymentRequested {
        order_id: String,
        company_id: String,
        total_amount: Decimal,
    },
    OrderCommitted {
        order_id: String,
        company_id: String,
        total_amount: Decimal,
    },
    InvitationAccepted {
        invitation_id: String,
        affiliate_id: String,
        company_id: String,
    },
    InvitationExpired {
        invitation_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event. Having no listeners is not an error.
    pub fn publish(&self, event: Event) {
        if let Err(err) = self.sender.send(event) {
            debug!("event dropped, no subscribers: {:?}", err.0);
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: Some(self.sender.subscribe()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live registration on the [`EventBus`].
#[derive(Debug)]
pub struct Subscription {
    receiver: Option<broadcast::Receiver<Event>>,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once disposed or once the bus
    /// is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged; skipping to latest events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// Unregisters the listener. Further `recv` calls return `None`.
    pub fn dispose(&mut self) {
        self.receiver = None;
    }
}

/// Logs every event until the bus shuts down.
pub async fn log_events(mut subscription: Subscription) {
    while let Some(event) = subscription.recv().await {
        info!(?event, "domain event");
    }
}
