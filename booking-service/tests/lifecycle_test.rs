//! End-to-end lifecycle: checkout, settlement, cancellation, re-checkout.

mod common;

use common::{far_future, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn full_booking_lifecycle() {
    let Some(app) = TestApp::spawn().await else { return };

    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    let court = app.seed_verified_court(Uuid::new_v4()).await;
    let slot = app.seed_slot(court, far_future(), 1500).await;

    // User A starts checkout: one INIT payment with a gateway session.
    app.mock_checkout_session("cs_life_1").await;
    let response = app
        .post_as(user_a, "/payments/start", json!({ "slot_id": slot }))
        .await;
    assert_eq!(response.status(), 200);

    let payments = app.payments_for_slot(slot).await;
    assert_eq!(payments.len(), 1);
    let p1 = payments[0];

    // The gateway confirms: booking materializes, payment settles.
    let event = TestApp::completed_event("cs_life_1", p1, slot, user_a);
    assert_eq!(app.deliver_webhook(&event).await.status(), 200);

    let (booking_id, owner) = app.confirmed_booking(slot).await.unwrap();
    assert_eq!(owner, user_a);
    let (status, linked) = app.payment_state(p1).await.unwrap();
    assert_eq!(status, "PAID");
    assert_eq!(linked, Some(booking_id));

    // User A cancels well before the cutoff: both rows are destroyed.
    let response = app
        .post_as(
            user_a,
            &format!("/bookings/{}/cancel", booking_id),
            json!({ "reason": "schedule conflict" }),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert!(!app.booking_exists(booking_id).await);
    assert!(app.payment_state(p1).await.is_none());

    // The slot is free again, and user B's fresh checkout creates a new,
    // distinct payment.
    let listing: Vec<serde_json::Value> = app
        .get_public(&format!("/slots?court_id={}", court))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listing[0]["available"], true);

    app.mock_checkout_session("cs_life_2").await;
    let response = app
        .post_as(user_b, "/payments/start", json!({ "slot_id": slot }))
        .await;
    assert_eq!(response.status(), 200);

    let payments = app.payments_for_slot(slot).await;
    assert_eq!(payments.len(), 1);
    assert_ne!(payments[0], p1);
    let (status, _) = app.payment_state(payments[0]).await.unwrap();
    assert_eq!(status, "INIT");
}
