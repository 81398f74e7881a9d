//! Settlement tests: completion, expiry, idempotency, race resolution and
//! signature enforcement.

mod common;

use common::{far_future, TestApp};
use uuid::Uuid;

#[tokio::test]
async fn completion_confirms_booking_and_marks_payment_paid() {
    let Some(app) = TestApp::spawn().await else { return };

    let payer = Uuid::new_v4();
    let court = app.seed_verified_court(Uuid::new_v4()).await;
    let slot = app.seed_slot(court, far_future(), 1500).await;
    let payment = app.seed_payment(slot, "cs_settle_1", "INIT", None).await;

    let event = TestApp::completed_event("cs_settle_1", payment, slot, payer);
    let response = app.deliver_webhook(&event).await;

    assert_eq!(response.status(), 200);

    let (booking_id, user_id) = app.confirmed_booking(slot).await.expect("booking missing");
    assert_eq!(user_id, payer);

    let (status, linked) = app.payment_state(payment).await.unwrap();
    assert_eq!(status, "PAID");
    assert_eq!(linked, Some(booking_id));
}

#[tokio::test]
async fn duplicate_completion_is_acknowledged_without_mutation() {
    let Some(app) = TestApp::spawn().await else { return };

    let payer = Uuid::new_v4();
    let court = app.seed_verified_court(Uuid::new_v4()).await;
    let slot = app.seed_slot(court, far_future(), 1500).await;
    let payment = app.seed_payment(slot, "cs_dup_1", "INIT", None).await;

    let event = TestApp::completed_event("cs_dup_1", payment, slot, payer);
    assert_eq!(app.deliver_webhook(&event).await.status(), 200);
    let first = app.confirmed_booking(slot).await.unwrap();

    // Redelivery of the same event must be a no-op acknowledgement.
    assert_eq!(app.deliver_webhook(&event).await.status(), 200);

    let second = app.confirmed_booking(slot).await.unwrap();
    assert_eq!(first.0, second.0);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE slot_id = $1")
        .bind(slot)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let (status, _) = app.payment_state(payment).await.unwrap();
    assert_eq!(status, "PAID");
}

#[tokio::test]
async fn losing_completion_fails_its_payment_without_double_booking() {
    let Some(app) = TestApp::spawn().await else { return };

    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    let court = app.seed_verified_court(Uuid::new_v4()).await;
    let slot = app.seed_slot(court, far_future(), 1500).await;

    let payment_a = app.seed_payment(slot, "cs_race_a", "INIT", None).await;
    let payment_b = app.seed_payment(slot, "cs_race_b", "INIT", None).await;

    // A's completion lands first and takes the slot.
    let event_a = TestApp::completed_event("cs_race_a", payment_a, slot, user_a);
    assert_eq!(app.deliver_webhook(&event_a).await.status(), 200);

    // B paid too, but the slot is gone: payment fails, no second booking.
    let event_b = TestApp::completed_event("cs_race_b", payment_b, slot, user_b);
    assert_eq!(app.deliver_webhook(&event_b).await.status(), 200);

    let (_, owner) = app.confirmed_booking(slot).await.unwrap();
    assert_eq!(owner, user_a);

    let (status_a, _) = app.payment_state(payment_a).await.unwrap();
    assert_eq!(status_a, "PAID");
    let (status_b, linked_b) = app.payment_state(payment_b).await.unwrap();
    assert_eq!(status_b, "FAILED");
    assert_eq!(linked_b, None);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE slot_id = $1")
        .bind(slot)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn expiry_removes_the_dead_attempt() {
    let Some(app) = TestApp::spawn().await else { return };

    let court = app.seed_verified_court(Uuid::new_v4()).await;
    let slot = app.seed_slot(court, far_future(), 1500).await;
    let payment = app.seed_payment(slot, "cs_exp_1", "INIT", None).await;

    let event = TestApp::expired_event("cs_exp_1", payment);
    let response = app.deliver_webhook(&event).await;

    assert_eq!(response.status(), 200);
    assert!(app.payment_state(payment).await.is_none());
    assert!(app.confirmed_booking(slot).await.is_none());
}

#[tokio::test]
async fn expiry_after_settlement_changes_nothing() {
    let Some(app) = TestApp::spawn().await else { return };

    let payer = Uuid::new_v4();
    let court = app.seed_verified_court(Uuid::new_v4()).await;
    let slot = app.seed_slot(court, far_future(), 1500).await;
    let payment = app.seed_payment(slot, "cs_exp_2", "INIT", None).await;

    let completed = TestApp::completed_event("cs_exp_2", payment, slot, payer);
    assert_eq!(app.deliver_webhook(&completed).await.status(), 200);

    // An out-of-order expiry for an already-settled payment is acknowledged
    // and ignored.
    let expired = TestApp::expired_event("cs_exp_2", payment);
    assert_eq!(app.deliver_webhook(&expired).await.status(), 200);

    let (status, _) = app.payment_state(payment).await.unwrap();
    assert_eq!(status, "PAID");
    assert!(app.confirmed_booking(slot).await.is_some());
}

#[tokio::test]
async fn invalid_signature_is_rejected_without_state_change() {
    let Some(app) = TestApp::spawn().await else { return };

    let payer = Uuid::new_v4();
    let court = app.seed_verified_court(Uuid::new_v4()).await;
    let slot = app.seed_slot(court, far_future(), 1500).await;
    let payment = app.seed_payment(slot, "cs_sig_1", "INIT", None).await;

    let event = TestApp::completed_event("cs_sig_1", payment, slot, payer).to_string();
    let response = app
        .deliver_webhook_raw(&event, "t=1700000000,v1=deadbeef")
        .await;

    assert_eq!(response.status(), 401);
    let (status, _) = app.payment_state(payment).await.unwrap();
    assert_eq!(status, "INIT");
    assert!(app.confirmed_booking(slot).await.is_none());
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let Some(app) = TestApp::spawn().await else { return };

    let response = app
        .client
        .post(format!("{}/webhooks/stripe", app.address))
        .header("content-type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn unparseable_payload_is_a_client_error() {
    let Some(app) = TestApp::spawn().await else { return };

    // Correctly signed, but not a shape this service can ever parse: the
    // gateway must not keep retrying it.
    let body = r#"{"hello":"world"}"#;
    let signature = app.sign_webhook(body);
    let response = app.deliver_webhook_raw(body, &signature).await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_event_types_are_acknowledged() {
    let Some(app) = TestApp::spawn().await else { return };

    let body = serde_json::json!({
        "id": "evt_other",
        "type": "payment_intent.created",
        "data": { "object": { "id": "pi_123" } }
    });

    let response = app.deliver_webhook(&body).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn completion_for_unknown_payment_is_acknowledged() {
    let Some(app) = TestApp::spawn().await else { return };

    let event = TestApp::completed_event(
        "cs_ghost_1",
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
    );

    let response = app.deliver_webhook(&event).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn completion_found_by_session_id_when_metadata_id_is_stale() {
    let Some(app) = TestApp::spawn().await else { return };

    let payer = Uuid::new_v4();
    let court = app.seed_verified_court(Uuid::new_v4()).await;
    let slot = app.seed_slot(court, far_future(), 1500).await;
    let payment = app.seed_payment(slot, "cs_fallback_1", "INIT", None).await;

    // The embedded payment id points nowhere; the session id lookup must
    // still find the row.
    let event = TestApp::completed_event("cs_fallback_1", Uuid::new_v4(), slot, payer);
    let response = app.deliver_webhook(&event).await;

    assert_eq!(response.status(), 200);
    let (status, _) = app.payment_state(payment).await.unwrap();
    assert_eq!(status, "PAID");
}
