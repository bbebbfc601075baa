//! Coupon evaluation against a seeded in-memory store.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::*;
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use xeco_checkout::services::affiliates::AffiliateRejection;
use xeco_checkout::services::coupons::{CouponRejection, CouponVerdict};
use xeco_checkout::store::CommerceStore;

#[tokio::test]
async fn percentage_coupon_takes_ten_percent_off() {
    let coupons = coupon_service(seeded_store());

    let verdict = coupons.evaluate("SAVE10", STORE_X, dec!(200.00)).await.unwrap();

    let discount = verdict.discount().expect("coupon accepted");
    assert_eq!(discount.discount_amount, dec!(20.00));
    assert_eq!(discount.final_total, dec!(180.00));
    assert!(discount.affiliate.is_none());
}

#[tokio::test]
async fn fixed_coupon_is_capped_at_cart_total() {
    let coupons = coupon_service(seeded_store());

    let verdict = coupons.evaluate("FIXED20", STORE_X, dec!(15.00)).await.unwrap();

    let discount = verdict.discount().expect("coupon accepted");
    assert_eq!(discount.discount_amount, dec!(15.00));
    assert_eq!(discount.final_total, dec!(0.00));
}

#[tokio::test]
async fn coupon_from_another_store_is_rejected() {
    let coupons = coupon_service(seeded_store());

    let response = coupons
        .validate_coupon("LOJAY5", STORE_X, dec!(100))
        .await
        .unwrap();

    assert!(!response.valid);
    assert_eq!(response.code.as_deref(), Some("WRONG_COMPANY"));
    assert_eq!(
        response.message,
        "Este cupom não é válido para os itens do seu carrinho"
    );
    assert!(response.discount_amount.is_none());
    assert!(response.final_total.is_none());
}

#[rstest]
#[case("save10")]
#[case("  SAVE10  ")]
#[case("Save10")]
#[tokio::test]
async fn codes_are_matched_case_insensitively(#[case] code: &str) {
    let coupons = coupon_service(seeded_store());
    let verdict = coupons.evaluate(code, STORE_X, dec!(50)).await.unwrap();
    assert!(verdict.is_accepted());
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("NAOEXISTE")]
#[tokio::test]
async fn unknown_or_blank_codes_are_not_found(#[case] code: &str) {
    let coupons = coupon_service(seeded_store());
    let verdict = coupons.evaluate(code, STORE_X, dec!(50)).await.unwrap();
    assert_eq!(verdict, CouponVerdict::Rejected(CouponRejection::NotFound));
}

#[tokio::test]
async fn evaluation_is_repeatable_and_does_not_consume_usage() {
    let store = seeded_store();
    let coupons = coupon_service(store.clone());

    let first = coupons.evaluate("SAVE10", STORE_X, dec!(80)).await.unwrap();
    let second = coupons.evaluate("SAVE10", STORE_X, dec!(80)).await.unwrap();

    assert_eq!(first, second);
    let stored = store.get_coupon("c-save10").await.unwrap().unwrap();
    assert_eq!(stored.used_count, 0);
}

#[tokio::test]
async fn applying_a_coupon_counts_one_use() {
    let store = seeded_store();
    let coupons = coupon_service(store.clone());

    assert_eq!(coupons.apply_coupon("c-save10").await.unwrap(), 1);
    assert_eq!(coupons.apply_coupon("c-save10").await.unwrap(), 2);
    assert_eq!(
        store.get_coupon("c-save10").await.unwrap().unwrap().used_count,
        2
    );
}

#[tokio::test]
async fn usage_limit_blocks_further_use() {
    let store = seeded_store();
    let mut limited = coupon("c-once", "UMAVEZ", STORE_X, "fixed", dec!(5));
    limited.max_uses = Some(1);
    store.insert_coupon(limited);
    let coupons = coupon_service(store);

    assert!(coupons.evaluate("UMAVEZ", STORE_X, dec!(30)).await.unwrap().is_accepted());
    coupons.apply_coupon("c-once").await.unwrap();

    let verdict = coupons.evaluate("UMAVEZ", STORE_X, dec!(30)).await.unwrap();
    assert_eq!(
        verdict,
        CouponVerdict::Rejected(CouponRejection::UsageLimitReached)
    );
}

#[tokio::test]
async fn expired_coupon_reports_its_expiry_date() {
    let store = seeded_store();
    let mut old = coupon("c-old", "VELHO", STORE_X, "percentage", dec!(10));
    old.expires_at = Some(Utc::now() - Duration::days(2));
    store.insert_coupon(old);
    let coupons = coupon_service(store);

    let response = coupons.validate_coupon("VELHO", STORE_X, dec!(30)).await.unwrap();
    assert!(!response.valid);
    assert_eq!(response.code.as_deref(), Some("EXPIRED"));
    assert!(response.message.starts_with("Este cupom expirou em "));
}

#[tokio::test]
async fn minimum_order_shortfall_is_reported_in_reais() {
    let store = seeded_store();
    let mut minimum = coupon("c-min", "MINIMO", STORE_X, "fixed", dec!(10));
    minimum.min_order_value = Some(dec!(100));
    store.insert_coupon(minimum);
    let coupons = coupon_service(store);

    let verdict = coupons.evaluate("MINIMO", STORE_X, dec!(70)).await.unwrap();
    let rejection = verdict.rejection().expect("rejected").clone();
    assert_eq!(
        rejection,
        CouponRejection::BelowMinimum {
            minimum: dec!(100),
            shortfall: dec!(30),
        }
    );
    assert_eq!(
        rejection.message(),
        "Pedido mínimo de R$ 100.00 para este cupom. Faltam R$ 30.00"
    );

    assert!(coupons.evaluate("MINIMO", STORE_X, dec!(100)).await.unwrap().is_accepted());
}

#[tokio::test]
async fn affiliate_coupon_carries_the_affiliate() {
    let coupons = coupon_service(seeded_store());

    let verdict = coupons.evaluate("ANA15", STORE_X, dec!(200)).await.unwrap();

    let discount = verdict.discount().expect("coupon accepted");
    assert_eq!(discount.discount_amount, dec!(30.00));
    let affiliate = discount.affiliate.as_ref().expect("affiliate attached");
    assert_eq!(affiliate.id, AFFILIATE);
    assert_eq!(discount.affiliate_commission_rate(), Some(dec!(10)));
}

#[tokio::test]
async fn affiliate_without_wallet_invalidates_the_coupon() {
    let coupons = coupon_service(seeded_store());

    let verdict = coupons.evaluate("SEMCARTEIRA", STORE_X, dec!(200)).await.unwrap();

    assert_matches!(
        verdict,
        CouponVerdict::Rejected(CouponRejection::Affiliate(AffiliateRejection::MissingWallet))
    );
}

#[tokio::test]
async fn affiliate_id_decides_the_coupon_kind() {
    use xeco_checkout::models::CouponKind;

    let store = seeded_store();
    // Marked as a company coupon but linked to an affiliate.
    let mut mislabeled = coupon("c-mislabeled", "ROTULO", STORE_X, "percentage", dec!(10));
    mislabeled.kind = Some(CouponKind::Company);
    mislabeled.affiliate_id = Some(AFFILIATE.into());
    store.insert_coupon(mislabeled);
    let coupons = coupon_service(store);

    let verdict = coupons.evaluate("ROTULO", STORE_X, dec!(100)).await.unwrap();
    let discount = verdict.discount().expect("coupon accepted");
    assert_eq!(
        discount.affiliate.as_ref().map(|a| a.id.as_str()),
        Some(AFFILIATE)
    );
}

#[tokio::test]
async fn discount_never_exceeds_the_cart() {
    let store = seeded_store();
    store.insert_coupon(coupon("c-big", "TUDO", STORE_X, "percentage", dec!(150)));
    let coupons = coupon_service(store);

    for total in [dec!(0.01), dec!(1), dec!(99.99), dec!(12345.67)] {
        let verdict = coupons.evaluate("TUDO", STORE_X, total).await.unwrap();
        let discount = verdict.discount().expect("coupon accepted");
        assert!(discount.discount_amount <= total);
        assert!(discount.final_total >= Decimal::ZERO);
        assert_eq!(discount.final_total + discount.discount_amount, total);
    }
}
