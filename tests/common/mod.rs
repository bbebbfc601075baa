#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;
use xeco_checkout::{
    auth::InMemoryAuthProvider,
    config::AppConfig,
    events::EventBus,
    models::{
        Affiliate, AffiliateInvitation, AffiliateStatus, CheckoutItem, CheckoutPayload, Company,
        Coupon, InvitationStatus, Product,
    },
    services::{
        checkout::{Address, CustomerData},
        signature::CanonicalCheckout, CheckoutSigner, CheckoutValidator, CouponService,
        InvitationService, OrderService, PaymentSplitCalculator,
    },
    store::InMemoryStore,
    AppState,
};

pub const SIGNING_SECRET: &str = "test_signing_secret_for_checkout_tests_0001";
pub const PLATFORM_WALLET: &str = "wallet-platform";

pub const STORE_X: &str = "loja-x";
pub const STORE_Y: &str = "loja-y";
pub const STORE_X_WALLET: &str = "wallet-x";

pub const SHIRT: &str = "p-camiseta";
pub const MUG: &str = "p-caneca";
pub const CAP_FROM_Y: &str = "p-bone-y";
pub const RETIRED: &str = "p-descontinuado";

pub const AFFILIATE: &str = "af-ana";
pub const AFFILIATE_WALLET: &str = "wallet-ana";
pub const UNFUNDED_AFFILIATE: &str = "af-sem-carteira";

pub fn company(id: &str, wallet: Option<&str>) -> Company {
    Company {
        id: id.into(),
        name: format!("Loja {}", id),
        active: true,
        wallet_id: wallet.map(Into::into),
    }
}

pub fn product(id: &str, company_id: &str, price: Decimal, stock: i64) -> Product {
    Product {
        id: id.into(),
        company_id: company_id.into(),
        name: id.trim_start_matches("p-").into(),
        price,
        stock,
        active: true,
    }
}

pub fn coupon(
    id: &str,
    code: &str,
    company_id: &str,
    discount_type: &str,
    value: Decimal,
) -> Coupon {
    Coupon {
        id: id.into(),
        code: code.into(),
        company_id: company_id.into(),
        affiliate_id: None,
        kind: None,
        discount_type: discount_type.into(),
        discount_value: value,
        is_active: true,
        expires_at: None,
        max_uses: None,
        used_count: 0,
        min_order_value: None,
    }
}

pub fn affiliate(id: &str, company_id: &str, wallet: &str, commission: Decimal) -> Affiliate {
    Affiliate {
        id: id.into(),
        user: format!("user-{}", id),
        wallet_id: wallet.into(),
        commission_rate: commission,
        active: AffiliateStatus::Active,
        company_relationed: company_id.into(),
        invite_code: id.to_uppercase().replace('-', ""),
        created_at: Utc::now(),
    }
}

pub fn invitation(id: &str, token: &str, email: &str, expires_in: Duration) -> AffiliateInvitation {
    AffiliateInvitation {
        id: id.into(),
        token: token.into(),
        email: email.into(),
        store_id: STORE_X.into(),
        expires_at: Utc::now() + expires_in,
        status: InvitationStatus::Pending,
        commission_rate: None,
        created_at: Utc::now(),
        accepted_at: None,
    }
}

/// Two stores, a handful of products, company and affiliate coupons.
pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();

    store.insert_company(company(STORE_X, Some(STORE_X_WALLET)));
    store.insert_company(company(STORE_Y, Some("wallet-y")));
    store.insert_company(company("loja-sem-carteira", None));

    store.insert_product(product(SHIRT, STORE_X, dec!(100), 10));
    store.insert_product(product(MUG, STORE_X, dec!(25.50), 3));
    store.insert_product(product(CAP_FROM_Y, STORE_Y, dec!(40), 5));
    let mut retired = product(RETIRED, STORE_X, dec!(10), 50);
    retired.active = false;
    store.insert_product(retired);

    store.insert_coupon(coupon("c-save10", "SAVE10", STORE_X, "percentage", dec!(10)));
    store.insert_coupon(coupon("c-fixed20", "FIXED20", STORE_X, "fixed", dec!(20)));
    store.insert_coupon(coupon("c-lojay", "LOJAY5", STORE_Y, "percentage", dec!(5)));

    store.insert_affiliate(affiliate(AFFILIATE, STORE_X, AFFILIATE_WALLET, dec!(10)));
    store.insert_affiliate(affiliate(UNFUNDED_AFFILIATE, STORE_X, "", dec!(10)));

    let mut ana = coupon("c-ana15", "ANA15", STORE_X, "percentage", dec!(15));
    ana.affiliate_id = Some(AFFILIATE.into());
    store.insert_coupon(ana);

    let mut unfunded = coupon("c-semcarteira", "SEMCARTEIRA", STORE_X, "percentage", dec!(5));
    unfunded.affiliate_id = Some(UNFUNDED_AFFILIATE.into());
    store.insert_coupon(unfunded);

    Arc::new(store)
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(SIGNING_SECRET.to_string(), PLATFORM_WALLET.to_string());
    cfg.environment = "test".to_string();
    cfg
}

pub fn signer() -> CheckoutSigner {
    CheckoutSigner::new(SIGNING_SECRET)
}

pub fn splits() -> PaymentSplitCalculator {
    PaymentSplitCalculator::new(PLATFORM_WALLET, dec!(8))
}

pub fn validator(store: Arc<InMemoryStore>) -> CheckoutValidator {
    CheckoutValidator::new(store, signer(), splits(), EventBus::default())
}

pub fn coupon_service(store: Arc<InMemoryStore>) -> CouponService {
    CouponService::new(store, EventBus::default())
}

pub fn order_service(store: Arc<InMemoryStore>) -> OrderService {
    let events = EventBus::default();
    OrderService::new(
        store.clone(),
        CheckoutValidator::new(store.clone(), signer(), splits(), events.clone()),
        CouponService::new(store, events.clone()),
        events,
    )
}

pub fn invitation_service(
    store: Arc<InMemoryStore>,
    auth: Arc<InMemoryAuthProvider>,
) -> InvitationService {
    InvitationService::new(store, auth, EventBus::default(), dec!(10), 10)
}

/// A cart line priced consistently from `unit_price`.
pub fn line(product_id: &str, quantity: i64, unit_price: Decimal) -> CheckoutItem {
    CheckoutItem {
        product_id: product_id.into(),
        product_name: None,
        quantity,
        unit_price,
        total_price: unit_price * Decimal::from(quantity),
    }
}

/// A checkout payload signed with the shared test secret.
pub fn signed_payload(
    company_id: &str,
    total_amount: Decimal,
    items: Vec<CheckoutItem>,
    coupon_code: Option<&str>,
) -> CheckoutPayload {
    let signature = signer()
        .sign(&CanonicalCheckout::new(company_id, total_amount, &items))
        .expect("signature");
    CheckoutPayload {
        order_id: None,
        company_id: Some(company_id.into()),
        user_id: Some("user-comprador".into()),
        total_amount: Some(total_amount),
        items,
        signature: Some(signature),
        coupon_code: coupon_code.map(Into::into),
    }
}

pub fn customer_data() -> CustomerData {
    CustomerData {
        name: "Ana Souza".into(),
        email: "ana@example.com".into(),
        cpf_cnpj: "529.982.247-25".into(),
        phone: Some("(11) 98765-4321".into()),
        address: Address {
            street: "Av. Paulista".into(),
            number: "1000".into(),
            complement: None,
            neighborhood: "Bela Vista".into(),
            city: "São Paulo".into(),
            state: "SP".into(),
            postal_code: "01310-100".into(),
        },
    }
}

/// HTTP harness over the full router with an in-memory store.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub auth: Arc<InMemoryAuthProvider>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(cfg: AppConfig) -> Self {
        let store = seeded_store();
        let auth = Arc::new(InMemoryAuthProvider::new());
        let state = AppState::new(cfg, store.clone(), auth.clone()).expect("app state");
        Self {
            router: xeco_checkout::app(state.clone()),
            state,
            store,
            auth,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
