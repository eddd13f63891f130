mod common;

use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};
use common::{Harness, dec, discount, line};
use storefront_api::{
    dto::checkout::CheckoutRequest,
    models::DiscountKind,
    services::{
        checkout_service::{CheckoutError, CheckoutState},
        promo_service::PromoRejection,
    },
};
use uuid::Uuid;

fn request(promo_code: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
        contact_email: "buyer@example.com".into(),
        contact_name: Some("Sam Buyer".into()),
        contact_phone: None,
        shipping_address: "1 Harbour St, Wellington".into(),
        payment_method: "card".into(),
        promo_code: promo_code.map(str::to_string),
        add_on_fees: dec("0"),
        idempotency_key: None,
    }
}

#[tokio::test]
async fn valid_checkout_ends_cleared_with_empty_cart() -> anyhow::Result<()> {
    let h = Harness::new(vec![line(1, "40.00", 2), line(2, "20.00", 1)], vec![]);

    let placed = h.service.place_order(h.owner_id, request(None)).await?;

    assert_eq!(placed.state, CheckoutState::Cleared);
    assert!(!placed.duplicate);
    assert_eq!(placed.order.line_items.len(), 2);
    assert_eq!(placed.order.totals.subtotal, dec("100.00"));
    assert_eq!(placed.order.totals.grand_total, dec("123.00"));
    assert!(placed.order.reference.starts_with("ORD-"));
    assert!(h.carts.snapshot(h.owner_id).is_empty());
    assert_eq!(h.orders.count(), 1);
    assert_eq!(h.notifier.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn persistence_failure_keeps_the_cart() -> anyhow::Result<()> {
    let h = Harness::new(vec![line(1, "40.00", 2)], vec![]);
    h.orders.fail_insert.store(true, Ordering::SeqCst);

    let err = h
        .service
        .place_order(h.owner_id, request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Persistence(_)));
    assert_eq!(h.carts.snapshot(h.owner_id).len(), 1);
    assert_eq!(h.notifier.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn cart_read_failure_is_retryable() -> anyhow::Result<()> {
    let h = Harness::new(vec![line(1, "40.00", 2)], vec![]);
    h.carts.fail_reads.store(true, Ordering::SeqCst);

    let err = h
        .service
        .place_order(h.owner_id, request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Persistence(_)));
    assert_eq!(h.orders.count(), 0);
    Ok(())
}

#[tokio::test]
async fn increment_failure_still_returns_order_and_clears_cart() -> anyhow::Result<()> {
    let welcome = discount("WELCOME10", DiscountKind::Percentage, "10");
    let h = Harness::new(vec![line(1, "100.00", 2)], vec![welcome]);
    h.discounts.fail_increment.store(true, Ordering::SeqCst);

    let placed = h
        .service
        .place_order(h.owner_id, request(Some("welcome10")))
        .await?;

    assert_eq!(placed.state, CheckoutState::Cleared);
    assert_eq!(placed.order.discount_code.as_deref(), Some("WELCOME10"));
    assert_eq!(placed.order.totals.discount_amount, dec("20.00"));
    assert_eq!(placed.order.totals.grand_total, dec("196.00"));
    assert_eq!(h.discounts.increments.load(Ordering::SeqCst), 1);
    assert_eq!(h.discounts.used_count("WELCOME10"), Some(0));
    assert!(h.carts.snapshot(h.owner_id).is_empty());
    Ok(())
}

#[tokio::test]
async fn applied_discount_bumps_usage_once() -> anyhow::Result<()> {
    let mut capped = discount("FLAT5", DiscountKind::Fixed, "5");
    capped.max_uses = Some(3);
    let h = Harness::new(vec![line(1, "30.00", 1)], vec![capped]);

    let placed = h.service.place_order(h.owner_id, request(Some("FLAT5"))).await?;

    assert_eq!(placed.order.totals.discount_amount, dec("5"));
    assert_eq!(h.discounts.used_count("FLAT5"), Some(1));
    Ok(())
}

#[tokio::test]
async fn expired_promo_does_not_block_checkout() -> anyhow::Result<()> {
    let mut expired = discount("EXPIRED10", DiscountKind::Percentage, "10");
    expired.expires_at = Some(Utc::now() - Duration::days(1));
    let h = Harness::new(vec![line(1, "100.00", 1)], vec![expired]);

    let placed = h
        .service
        .place_order(h.owner_id, request(Some("EXPIRED10")))
        .await?;

    assert_eq!(placed.promo_rejection, Some(PromoRejection::Expired));
    assert_eq!(placed.order.discount_code, None);
    assert_eq!(placed.order.totals.discount_amount, dec("0"));
    assert_eq!(placed.order.totals.grand_total, dec("123.00"));
    assert_eq!(h.discounts.increments.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn notification_failure_is_swallowed() -> anyhow::Result<()> {
    let h = Harness::new(vec![line(1, "10.00", 1)], vec![]);
    h.notifier.fail.store(true, Ordering::SeqCst);

    let placed = h.service.place_order(h.owner_id, request(None)).await?;

    assert_eq!(placed.state, CheckoutState::Cleared);
    assert_eq!(h.notifier.calls(), 1);
    let payload = h.notifier.payloads.lock().unwrap()[0].clone();
    assert_eq!(
        payload.url,
        format!("https://shop.test/admin/orders/{}", placed.order.id)
    );
    assert!(payload.message.contains(&placed.order.reference));
    Ok(())
}

#[tokio::test]
async fn cart_clear_failure_still_returns_order() -> anyhow::Result<()> {
    let h = Harness::new(vec![line(1, "10.00", 1)], vec![]);
    h.carts.fail_clear.store(true, Ordering::SeqCst);

    let placed = h.service.place_order(h.owner_id, request(None)).await?;

    assert_eq!(placed.state, CheckoutState::Cleared);
    assert_eq!(h.orders.count(), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_request_reports_every_field_and_persists_nothing() -> anyhow::Result<()> {
    let h = Harness::new(vec![], vec![]);
    let mut req = request(None);
    req.contact_email = "not-an-email".into();
    req.shipping_address = "  ".into();

    let err = h.service.place_order(h.owner_id, req).await.unwrap_err();

    let CheckoutError::Validation(fields) = err else {
        panic!("expected a validation error");
    };
    let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(names, ["contact_email", "shipping_address", "cart"]);
    assert_eq!(h.orders.count(), 0);
    assert_eq!(h.notifier.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn repeated_idempotency_key_returns_first_order() -> anyhow::Result<()> {
    let mut capped = discount("ONCE", DiscountKind::Fixed, "1");
    capped.max_uses = Some(10);
    let h = Harness::new(vec![line(1, "10.00", 1)], vec![capped]);
    let key = Uuid::new_v4();
    let mut req = request(Some("ONCE"));
    req.idempotency_key = Some(key);

    let first = h.service.place_order(h.owner_id, req.clone()).await?;
    let second = h.service.place_order(h.owner_id, req).await?;

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(first.order.id, second.order.id);
    assert_eq!(h.orders.count(), 1);
    assert_eq!(h.discounts.used_count("ONCE"), Some(1));
    assert_eq!(h.notifier.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn replayed_key_leaves_a_refilled_cart_alone() -> anyhow::Result<()> {
    let h = Harness::new(vec![line(1, "10.00", 1)], vec![]);
    let mut req = request(None);
    req.idempotency_key = Some(Uuid::new_v4());

    let first = h.service.place_order(h.owner_id, req.clone()).await?;
    h.carts.refill(h.owner_id, vec![line(2, "5.00", 3)]);
    let replay = h.service.place_order(h.owner_id, req).await?;

    assert!(replay.duplicate);
    assert_eq!(replay.order.id, first.order.id);
    let cart = h.carts.snapshot(h.owner_id);
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].product_id, 2);
    Ok(())
}

#[tokio::test]
async fn losing_the_insert_race_clears_the_submitted_cart() -> anyhow::Result<()> {
    let h = Harness::new(vec![line(1, "10.00", 1)], vec![]);
    let mut req = request(None);
    req.idempotency_key = Some(Uuid::new_v4());

    let first = h.service.place_order(h.owner_id, req.clone()).await?;
    h.carts.refill(h.owner_id, vec![line(1, "10.00", 1)]);
    h.orders.miss_key_lookups.store(true, Ordering::SeqCst);
    let second = h.service.place_order(h.owner_id, req).await?;

    assert!(second.duplicate);
    assert_eq!(second.order.id, first.order.id);
    assert!(h.carts.snapshot(h.owner_id).is_empty());
    assert_eq!(h.orders.count(), 1);
    assert_eq!(h.notifier.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn cap_reached_after_validation_keeps_the_discount() -> anyhow::Result<()> {
    let mut last_use = discount("LAST5", DiscountKind::Fixed, "5");
    last_use.max_uses = Some(3);
    last_use.used_count = 2;
    let h = Harness::new(vec![line(1, "30.00", 1)], vec![last_use]);
    h.discounts.rival_use_first.store(true, Ordering::SeqCst);

    let placed = h.service.place_order(h.owner_id, request(Some("LAST5"))).await?;

    assert_eq!(placed.state, CheckoutState::Cleared);
    assert_eq!(placed.order.discount_code.as_deref(), Some("LAST5"));
    assert_eq!(placed.order.totals.discount_amount, dec("5"));
    assert_eq!(h.discounts.increments.load(Ordering::SeqCst), 1);
    assert_eq!(h.discounts.used_count("LAST5"), Some(3));
    Ok(())
}

#[tokio::test]
async fn negative_add_on_fees_are_rejected_by_quote_and_checkout() -> anyhow::Result<()> {
    let h = Harness::new(vec![line(1, "10.00", 1)], vec![]);

    let err = h.service.quote(h.owner_id, None, dec("-1")).await.unwrap_err();
    let CheckoutError::Validation(fields) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(fields[0].field, "add_on_fees");

    let mut req = request(None);
    req.add_on_fees = dec("-1");
    let err = h.service.place_order(h.owner_id, req).await.unwrap_err();
    let CheckoutError::Validation(fields) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(fields[0].field, "add_on_fees");
    assert_eq!(h.orders.count(), 0);
    Ok(())
}

#[tokio::test]
async fn quote_prices_cart_without_side_effects() -> anyhow::Result<()> {
    let welcome = discount("WELCOME10", DiscountKind::Percentage, "10");
    let h = Harness::new(vec![line(1, "100.00", 2)], vec![welcome]);

    let quote = h
        .service
        .quote(h.owner_id, Some("WELCOME10"), dec("0"))
        .await?;

    assert_eq!(quote.totals.grand_total, dec("196.00"));
    assert_eq!(quote.item_count, 2);
    assert_eq!(quote.discount_code.as_deref(), Some("WELCOME10"));
    assert_eq!(h.discounts.used_count("WELCOME10"), Some(0));
    assert_eq!(h.carts.snapshot(h.owner_id).len(), 1);
    Ok(())
}
