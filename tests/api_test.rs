//! HTTP surface of the checkout API.

mod common;

use axum::http::{Method, StatusCode};
use axum::body;
use chrono::Duration;
use common::*;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload_json(payload: &xeco_checkout::models::CheckoutPayload) -> Value {
    serde_json::to_value(payload).expect("payload json")
}

#[tokio::test]
async fn health_reports_up() {
    let app = TestApp::new();

    let response = app.request(Method::GET, "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "up");
}

#[tokio::test]
async fn metrics_are_exposed_as_text() {
    let app = TestApp::new();
    // Touch a counter so the registry is not empty.
    app.request(
        Method::POST,
        "/api/v1/coupons/validate",
        Some(json!({ "code": "SAVE10", "companyId": STORE_X, "cartTotal": 10 })),
    )
    .await;

    let response = app.request(Method::GET, "/metrics", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("coupon_validations_total"));
}

#[tokio::test]
async fn coupon_validation_over_http() {
    let app = TestApp::new();

    let response = app
        .request(
            Method::POST,
            "/api/v1/coupons/validate",
            Some(json!({ "code": "SAVE10", "companyId": STORE_X, "cartTotal": 200.0 })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["message"], "Cupom aplicado com sucesso");
    assert_eq!(body["discountAmount"], json!(20.0));
    assert_eq!(body["finalTotal"], json!(180.0));
    assert_eq!(body["coupon"]["code"], "SAVE10");
}

#[tokio::test]
async fn rejected_coupon_is_still_a_200() {
    let app = TestApp::new();

    let response = app
        .request(
            Method::POST,
            "/api/v1/coupons/validate",
            Some(json!({ "code": "LOJAY5", "companyId": STORE_X, "cartTotal": 50 })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["code"], "WRONG_COMPANY");
    assert!(body.get("discountAmount").is_none());
}

#[tokio::test]
async fn negative_cart_total_is_bad_input() {
    let app = TestApp::new();

    let response = app
        .request(
            Method::POST,
            "/api/v1/coupons/validate",
            Some(json!({ "code": "SAVE10", "companyId": STORE_X, "cartTotal": -1 })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn applying_a_coupon_returns_the_new_count() {
    let app = TestApp::new();

    let response = app
        .request(Method::POST, "/api/v1/coupons/c-fixed20/apply", None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["usedCount"], 1);

    let missing = app
        .request(Method::POST, "/api/v1/coupons/nao-existe/apply", None)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn split_endpoint_pays_platform_affiliate_and_store() {
    let app = TestApp::new();

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/splits",
            Some(json!({
                "totalAmount": 1000,
                "storeWalletId": "wallet-loja",
                "affiliate": { "walletId": "wallet-afiliado", "commissionPercentage": 10 }
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = response_json(response).await["data"].clone();
    assert_eq!(data["platformFee"], json!(80.0));
    assert_eq!(data["affiliateCommission"], json!(100.0));
    assert_eq!(data["storeAmount"], json!(820.0));
    assert_eq!(data["splits"].as_array().unwrap().len(), 3);
    assert_eq!(data["splits"][2]["percentageValue"], json!(82.0));
    assert_eq!(data["allocations"][2]["amount"], json!(820.0));
}

#[tokio::test]
async fn split_with_excessive_commission_is_rejected() {
    let app = TestApp::new();

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/splits",
            Some(json!({
                "totalAmount": 100,
                "storeWalletId": "wallet-loja",
                "affiliate": { "walletId": "wallet-afiliado", "commissionPercentage": 95 }
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn valid_checkout_returns_the_server_view() {
    let app = TestApp::new();
    let payload = signed_payload(STORE_X, dec!(200), vec![line(SHIRT, 2, dec!(100))], None);

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/validate",
            Some(payload_json(&payload)),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["valid"], true);
    assert_eq!(body["data"]["finalTotal"], json!(200.0));
    assert_eq!(body["data"]["splits"]["platformFee"], json!(16.0));
}

#[tokio::test]
async fn price_tampering_gets_a_409_with_the_error_contract() {
    let app = TestApp::new();
    let mut payload = signed_payload(STORE_X, dec!(100), vec![line(SHIRT, 2, dec!(50))], None);
    payload.order_id = Some("pedido-7".into());

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/validate",
            Some(payload_json(&payload)),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "PRICE_MISMATCH");
    assert_eq!(body["code"], "PRICE_MISMATCH");
    assert_eq!(body["errorType"], "SECURITY");
    assert_eq!(body["orderId"], "pedido-7");
    assert!(body["timestamp"].is_string());
    assert_eq!(body["errors"][0]["code"], "PRICE_MISMATCH");
    assert_eq!(body["errors"][0]["field"], "items[0]");
}

#[tokio::test]
async fn bad_signature_gets_a_403() {
    let app = TestApp::new();
    let mut payload = signed_payload(STORE_X, dec!(100), vec![line(SHIRT, 1, dec!(100))], None);
    payload.signature = Some("00".repeat(32));

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/validate",
            Some(payload_json(&payload)),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response).await;
    assert_eq!(body["error"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn empty_checkout_lists_every_shape_error() {
    let app = TestApp::new();

    let response = app
        .request(Method::POST, "/api/v1/checkout/validate", Some(json!({})))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "INVALID_COMPANY_ID");
    assert_eq!(body["errorType"], "VALIDATION");
    assert_eq!(body["errors"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn placing_an_order_commits_it() {
    let app = TestApp::new();
    let mut payload = signed_payload(STORE_X, dec!(180), vec![line(SHIRT, 2, dec!(100))], Some("SAVE10"));
    payload.order_id = Some("pedido-http".into());

    let response = app
        .request(Method::POST, "/api/v1/orders", Some(payload_json(&payload)))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["order"]["id"], "pedido-http");
    assert_eq!(body["data"]["order"]["status"], "PENDING_PAYMENT");

    let fetched = app
        .request(Method::GET, "/api/v1/orders/pedido-http", None)
        .await;
    assert_eq!(fetched.status(), StatusCode::OK);
    let fetched = response_json(fetched).await;
    assert_eq!(fetched["data"]["items"].as_array().unwrap().len(), 1);

    let unknown = app
        .request(Method::GET, "/api/v1/orders/nao-existe", None)
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_invitation_answers_410() {
    let app = TestApp::new();
    app.store.insert_invitation(invitation(
        "inv-http",
        "tok-http",
        "hugo@example.com",
        -Duration::minutes(5),
    ));

    let response = app
        .request(
            Method::POST,
            "/api/v1/affiliate-invitations/confirm",
            Some(json!({ "token": "tok-http", "email": "hugo@example.com" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::GONE);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "INVITATION_EXPIRED");
    assert_eq!(body["message"], "Este convite expirou");
}

#[tokio::test]
async fn confirmed_invitation_returns_the_affiliate() {
    let app = TestApp::new();
    app.store.insert_invitation(invitation(
        "inv-ok",
        "tok-ok",
        "iris@example.com",
        Duration::days(3),
    ));

    let response = app
        .request(
            Method::POST,
            "/api/v1/affiliate-invitations/confirm",
            Some(json!({ "token": "tok-ok", "email": "iris@example.com" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["companyId"], STORE_X);
    assert_eq!(body["userCreated"], true);
    assert_eq!(body["inviteCode"].as_str().unwrap().len(), 8);
    assert_eq!(app.auth.password_resets_sent("iris@example.com"), 1);

    let replay = app
        .request(
            Method::POST,
            "/api/v1/affiliate-invitations/confirm",
            Some(json!({ "token": "tok-ok", "email": "iris@example.com" })),
        )
        .await;
    assert_eq!(replay.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn checkout_session_without_workflow_is_refused() {
    let app = TestApp::new();

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/sessions",
            Some(json!({
                "userId": "user-comprador",
                "companyId": STORE_X,
                "items": [{ "productId": SHIRT, "quantity": 1, "unitPrice": 100, "totalPrice": 100 }],
                "customer": serde_json::to_value(customer_data()).unwrap(),
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["code"], "INVALID_OPERATION");
}

#[tokio::test]
async fn oversized_cart_is_rejected_before_the_coupon_is_priced() {
    let app = TestApp::new();

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/sessions",
            Some(json!({
                "userId": "user-comprador",
                "companyId": STORE_X,
                "couponCode": "SAVE10",
                "items": [{
                    "productId": SHIRT,
                    "quantity": i64::MAX,
                    "unitPrice": 1e12,
                    "totalPrice": 1
                }],
                "customer": serde_json::to_value(customer_data()).unwrap(),
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn checkout_session_is_created_through_the_workflow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "checkoutUrl": "https://pagamento.example.com/c/xyz",
            "orderId": "pedido-sessao",
            "asaasPaymentId": "pay_9",
            "status": "PENDING",
        })))
        .expect(1)
        .mount(&server)
        .await;
    let mut cfg = test_config();
    cfg.payment_workflow_url = Some(format!("{}/webhook/checkout", server.uri()));
    let app = TestApp::with_config(cfg);

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/sessions",
            Some(json!({
                "orderId": "pedido-sessao",
                "userId": "user-comprador",
                "companyId": STORE_X,
                "couponCode": "save10",
                "items": [{ "productId": SHIRT, "quantity": 2, "unitPrice": 100, "totalPrice": 200 }],
                "customer": serde_json::to_value(customer_data()).unwrap(),
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["checkoutUrl"], "https://pagamento.example.com/c/xyz");
    assert_eq!(body["asaasPaymentId"], "pay_9");

    let requests = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["couponCode"], "SAVE10");
    assert_eq!(sent["totalAmount"], json!(180.0));
}

#[tokio::test]
async fn checkout_session_with_invalid_coupon_is_a_conflict() {
    let mut cfg = test_config();
    cfg.payment_workflow_url = Some("http://127.0.0.1:9/unused".into());
    let app = TestApp::with_config(cfg);

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/sessions",
            Some(json!({
                "userId": "user-comprador",
                "companyId": STORE_X,
                "couponCode": "LOJAY5",
                "items": [{ "productId": SHIRT, "quantity": 1, "unitPrice": 100, "totalPrice": 100 }],
                "customer": serde_json::to_value(customer_data()).unwrap(),
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["error"], "WRONG_COMPANY");
}

#[tokio::test]
async fn workflow_rejection_is_relayed_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "error": "INVALID_SIGNATURE",
            "code": "INVALID_SIGNATURE",
            "errorType": "SECURITY",
        })))
        .expect(1)
        .mount(&server)
        .await;
    let mut cfg = test_config();
    cfg.payment_workflow_url = Some(server.uri());
    let app = TestApp::with_config(cfg);

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/sessions",
            Some(json!({
                "orderId": "pedido-403",
                "userId": "user-comprador",
                "companyId": STORE_X,
                "items": [{ "productId": SHIRT, "quantity": 1, "unitPrice": 100, "totalPrice": 100 }],
                "customer": serde_json::to_value(customer_data()).unwrap(),
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response).await;
    assert_eq!(body["error"], "INVALID_SIGNATURE");
    assert_eq!(body["errorType"], "SECURITY");
    assert_eq!(body["orderId"], "pedido-403");
}
