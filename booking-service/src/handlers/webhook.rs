//! Gateway webhook handler.
//!
//! The gateway is an at-least-once, out-of-order delivery channel: every
//! branch here tolerates duplicated and late events. Signature verification
//! happens before anything else; an unverifiable payload is never acted on.

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Payment, PaymentStatus};
use crate::services::metrics::record_settlement;
use crate::services::stripe::{
    CheckoutSessionObject, GatewayEvent, EVENT_CHECKOUT_COMPLETED, EVENT_CHECKOUT_EXPIRED,
};
use crate::services::SettlementOutcome;
use crate::AppState;

/// Webhook endpoint for gateway settlement events.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.stripe.is_webhook_configured() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "Webhook secret not configured"
        )));
    }

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing Stripe-Signature header");
            AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature"))
        })?;

    let is_valid = state
        .stripe
        .verify_webhook_signature(body.as_bytes(), signature)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Malformed webhook signature header");
            false
        });

    if !is_valid {
        tracing::warn!("Invalid webhook signature");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    // A payload this service can never parse must be acknowledged as a
    // client error, or the gateway will redeliver it forever.
    let event = state.stripe.parse_webhook_event(&body).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse webhook event");
        AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload"))
    })?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        session_id = %event.data.object.id,
        "Processing gateway webhook"
    );

    match event.event_type.as_str() {
        EVENT_CHECKOUT_COMPLETED => handle_completion(&state, &event).await?,
        EVENT_CHECKOUT_EXPIRED => handle_expiry(&state, &event).await?,
        other => {
            tracing::debug!(event_type = %other, "Unhandled webhook event type");
        }
    }

    Ok(Json(json!({ "received": true })))
}

/// Locate the payment for a session: by embedded payment id first, falling
/// back to the gateway session id when the id is missing or stale.
async fn locate_payment(
    state: &AppState,
    session: &CheckoutSessionObject,
) -> Result<Option<Payment>, AppError> {
    if let Some(payment_id) = session
        .metadata
        .payment_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok())
    {
        if let Some(payment) = state.db.get_payment(payment_id).await? {
            return Ok(Some(payment));
        }
    }

    state.db.get_payment_by_session(&session.id).await
}

async fn handle_completion(state: &AppState, event: &GatewayEvent) -> Result<(), AppError> {
    let session = &event.data.object;

    let Some(payment) = locate_payment(state, session).await? else {
        tracing::warn!(session_id = %session.id, "Completion event for unknown payment");
        return Ok(());
    };

    if payment.status() == PaymentStatus::Paid {
        // Duplicate delivery: acknowledge, change nothing.
        record_settlement("duplicate");
        state.audit.record(
            "PAYMENT_DUPLICATE_IGNORED",
            None,
            "payment",
            Some(payment.payment_id.to_string()),
            Some(json!({ "gateway_session_id": session.id })),
        );
        return Ok(());
    }

    let slot_id = session
        .metadata
        .slot_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .or(payment.slot_id)
        .ok_or_else(|| {
            tracing::error!(payment_id = %payment.payment_id, "Payment references no slot");
            AppError::InternalError(anyhow::anyhow!("Payment references no slot"))
        })?;

    let user_id = session
        .metadata
        .actor_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| {
            tracing::error!(session_id = %session.id, "Completion event missing actor id");
            AppError::BadRequest(anyhow::anyhow!("Webhook payload missing actor id"))
        })?;

    // Database errors propagate as a server error so the gateway retries the
    // delivery; the transaction inside has already rolled back.
    match state
        .db
        .settle_completion(payment.payment_id, slot_id, user_id)
        .await?
    {
        SettlementOutcome::Confirmed(booking) => {
            record_settlement("paid");
            state.audit.record(
                "PAYMENT_PAID",
                None,
                "payment",
                Some(payment.payment_id.to_string()),
                Some(json!({
                    "gateway_session_id": session.id,
                    "booking_id": booking.booking_id,
                })),
            );
            tracing::info!(
                payment_id = %payment.payment_id,
                booking_id = %booking.booking_id,
                "Payment settled, booking confirmed"
            );
        }
        SettlementOutcome::SlotTaken => {
            record_settlement("failed");
            state.audit.record(
                "PAYMENT_FAILED",
                None,
                "payment",
                Some(payment.payment_id.to_string()),
                Some(json!({
                    "gateway_session_id": session.id,
                    "reason": "slot_taken",
                })),
            );
            // The payer was charged for a slot someone else secured first.
            // Refunding is a manual workflow; this log line is its trigger.
            tracing::error!(
                payment_id = %payment.payment_id,
                slot_id = %slot_id,
                "Paid checkout lost the slot race; manual refund required"
            );
        }
        SettlementOutcome::AlreadySettled => {
            record_settlement("duplicate");
            state.audit.record(
                "PAYMENT_DUPLICATE_IGNORED",
                None,
                "payment",
                Some(payment.payment_id.to_string()),
                Some(json!({ "gateway_session_id": session.id })),
            );
        }
    }

    Ok(())
}

async fn handle_expiry(state: &AppState, event: &GatewayEvent) -> Result<(), AppError> {
    let session = &event.data.object;

    let Some(payment) = locate_payment(state, session).await? else {
        tracing::debug!(session_id = %session.id, "Expiry event for unknown payment");
        return Ok(());
    };

    if state.db.expire_payment(payment.payment_id).await? {
        record_settlement("expired");
        state.audit.record(
            "PAYMENT_EXPIRED",
            None,
            "payment",
            Some(payment.payment_id.to_string()),
            Some(json!({
                "gateway_session_id": session.id,
                "booking_id": payment.booking_id,
            })),
        );
        tracing::info!(payment_id = %payment.payment_id, "Expired checkout attempt removed");
    }

    Ok(())
}
