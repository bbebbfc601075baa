pub mod checkout;
pub mod coupons;
pub mod health;
pub mod invitations;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use axum::Router;

use crate::auth::AuthProvider;
use crate::cache::CompanyDirectory;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventBus;
use crate::services::{
    CheckoutOrchestrator, CheckoutSigner, CheckoutValidator, CouponService, InvitationService,
    OrderService, PaymentSplitCalculator,
};
use crate::store::CommerceStore;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub coupons: Arc<CouponService>,
    pub splits: Arc<PaymentSplitCalculator>,
    pub validator: Arc<CheckoutValidator>,
    pub orchestrator: Arc<CheckoutOrchestrator>,
    pub orders: Arc<OrderService>,
    pub invitations: Arc<InvitationService>,
}

impl AppServices {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn CommerceStore>,
        auth: Arc<dyn AuthProvider>,
        events: EventBus,
    ) -> Result<Self, ServiceError> {
        let signer = CheckoutSigner::new(&config.checkout_signing_secret);
        let splits = PaymentSplitCalculator::new(
            config.platform_wallet_id.clone(),
            config.platform_fee_percent,
        );

        let coupons = CouponService::new(store.clone(), events.clone());
        let validator = CheckoutValidator::new(
            store.clone(),
            signer.clone(),
            splits.clone(),
            events.clone(),
        );
        let orchestrator = CheckoutOrchestrator::new(
            config.payment_workflow_url.clone(),
            config.payment_workflow_timeout(),
            config.app_base_url.clone(),
            signer,
            splits.clone(),
            CompanyDirectory::new(store.clone(), config.company_cache_ttl()),
            events.clone(),
        )?;
        let orders = OrderService::new(
            store.clone(),
            validator.clone(),
            coupons.clone(),
            events.clone(),
        );
        let invitations = InvitationService::new(
            store,
            auth,
            events,
            config.default_affiliate_commission,
            config.affiliate_code_attempts,
        );

        Ok(Self {
            coupons: Arc::new(coupons),
            splits: Arc::new(splits),
            validator: Arc::new(validator),
            orchestrator: Arc::new(orchestrator),
            orders: Arc::new(orders),
            invitations: Arc::new(invitations),
        })
    }
}

/// Routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/coupons", coupons::coupon_routes())
        .nest("/payments", payments::payment_routes())
        .nest("/checkout", checkout::checkout_routes())
        .nest("/orders", orders::order_routes())
        .nest("/affiliate-invitations", invitations::invitation_routes())
}
