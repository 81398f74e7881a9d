//! Checkout orchestration handlers.
//!
//! Opens gateway checkout sessions for slots and lets a payer abandon an
//! in-flight attempt. Bookings themselves are only ever created by the
//! settlement webhook.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::AuthContext;
use crate::models::{BookingStatus, CreatePayment, PaymentStatus};
use crate::services::metrics::record_checkout_session;
use crate::services::CheckoutMetadata;
use crate::AppState;

/// Request to start a checkout. Either a slot, or a booking reference from
/// an earlier attempt that should be retried.
#[derive(Debug, Deserialize)]
pub struct StartPaymentRequest {
    pub booking_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StartPaymentResponse {
    pub checkout_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelPaymentQuery {
    pub payment_id: Option<Uuid>,
}

/// Append a query parameter to a redirect URL.
fn append_query_param(url: &str, key: &str, value: &str) -> Result<String, AppError> {
    let mut parsed = reqwest::Url::parse(url)
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid redirect URL: {}", e)))?;
    parsed.query_pairs_mut().append_pair(key, value);
    Ok(parsed.to_string())
}

/// Start a checkout for a slot.
///
/// Creates the INIT payment, opens the gateway session and persists the
/// session id inside one transaction; if the gateway call fails nothing is
/// committed, so no payment row ever references a session that was not
/// actually created.
pub async fn start_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<StartPaymentRequest>,
) -> Result<Json<StartPaymentResponse>, AppError> {
    if !state.stripe.is_configured() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "Payment gateway not configured"
        )));
    }

    let mut stale_booking = None;
    let mut slot_id = payload.slot_id;

    if let Some(booking_id) = payload.booking_id {
        let booking = state
            .db
            .get_booking(booking_id)
            .await?
            .filter(|b| b.user_id == auth.user_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Booking not found")))?;

        if booking.status() == BookingStatus::Confirmed {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Booking already confirmed"
            )));
        }

        slot_id = Some(booking.slot_id);
        stale_booking = Some(booking);
    }

    let slot_id =
        slot_id.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("slot_id required")))?;

    let slot = state
        .db
        .get_slot(slot_id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Slot not found")))?;

    let court = state.db.get_court(slot.court_id).await?.ok_or_else(|| {
        tracing::error!(slot_id = %slot_id, court_id = %slot.court_id, "Slot references missing court");
        AppError::InternalError(anyhow::anyhow!("Slot references missing court"))
    })?;

    if !court.is_bookable() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Court not open for booking"
        )));
    }

    if state.db.confirmed_booking_for_slot(slot_id).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!("Slot already booked")));
    }

    let mut tx = state.db.begin().await?;

    // A retried attempt clears its stale payment/booking pair first so the
    // abandoned attempt cannot block this one.
    if let Some(ref booking) = stale_booking {
        state.db.discard_attempt_tx(&mut tx, booking).await?;
    }

    let payment = state
        .db
        .insert_payment_tx(
            &mut tx,
            &CreatePayment {
                slot_id: slot.slot_id,
                provider: "STRIPE".to_string(),
                amount: slot.price,
                currency: state.config.booking.default_currency.clone(),
            },
        )
        .await?;

    let cancel_url = append_query_param(
        state.stripe.cancel_url(),
        "payment_id",
        &payment.payment_id.to_string(),
    )?;

    let metadata = CheckoutMetadata {
        payment_id: payment.payment_id,
        slot_id: slot.slot_id,
        actor_id: auth.user_id,
    };

    let label = format!("Court booking (slot {})", slot.slot_id);

    // An error here drops the transaction, rolling the INIT payment back.
    let session = state
        .stripe
        .create_checkout_session(
            slot.price,
            &state.config.booking.default_currency,
            &label,
            &cancel_url,
            &metadata,
        )
        .await
        .map_err(|e| {
            record_checkout_session("gateway_error");
            tracing::error!(error = %e, slot_id = %slot_id, "Failed to open checkout session");
            AppError::BadGateway(format!("Failed to open checkout session: {}", e))
        })?;

    state
        .db
        .attach_gateway_session_tx(&mut tx, payment.payment_id, &session.id)
        .await?;

    tx.commit()
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Commit failed: {}", e)))?;

    record_checkout_session("created");

    state.audit.record(
        "PAYMENT_SESSION_CREATED",
        Some(auth.user_id),
        "payment",
        Some(payment.payment_id.to_string()),
        Some(json!({ "gateway_session_id": session.id, "slot_id": slot.slot_id })),
    );

    tracing::info!(
        payment_id = %payment.payment_id,
        session_id = %session.id,
        "Checkout session opened"
    );

    Ok(Json(StartPaymentResponse {
        checkout_url: session.url,
    }))
}

/// Abandon an in-flight checkout attempt.
///
/// Deletes the INIT payment; an attempt that already settled cannot be
/// cancelled this way.
pub async fn cancel_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<CancelPaymentQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let payment_id = query
        .payment_id
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("payment_id required")))?;

    let payment = state
        .db
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    if payment.status() == PaymentStatus::Paid {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Payment already confirmed"
        )));
    }

    // Guarded: a settlement racing this call wins and the delete matches
    // nothing.
    if !state.db.delete_unpaid_payment(payment_id).await? {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Payment already confirmed"
        )));
    }

    state.audit.record(
        "PAYMENT_CANCELLED",
        Some(auth.user_id),
        "payment",
        Some(payment_id.to_string()),
        Some(json!({ "reason": "user_cancelled" })),
    );

    Ok(Json(json!({ "message": "Payment cancelled" })))
}
