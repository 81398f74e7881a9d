//! Booking cancellation handlers.
//!
//! Bookings are never created here; a direct create call is rejected and
//! redirected to checkout so a booking can only materialize through a
//! settled payment.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::{AuthContext, CAPABILITY_ADMIN};
use crate::models::BookingStatus;
use crate::services::metrics::record_cancellation;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

fn clean_reason(reason: Option<String>) -> Option<String> {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

/// Direct booking creation is not a thing: slots are claimed by paying.
pub async fn create_booking(_auth: AuthContext) -> Result<Json<serde_json::Value>, AppError> {
    Err(AppError::BadRequest(anyhow::anyhow!(
        "Use /payments/start with slot_id to book and pay; bookings are created only after successful payment"
    )))
}

/// Cancel a confirmed booking, subject to the cutoff policy.
///
/// Destroys the booking row (and any trailing payment) so the slot frees up
/// immediately; the reason survives only in the audit event. Refunds are a
/// downstream manual process.
pub async fn cancel_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<Uuid>,
    payload: Option<Json<CancelBookingRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let reason = clean_reason(payload.and_then(|Json(p)| p.reason));

    let booking = state
        .db
        .get_booking(booking_id)
        .await?
        .filter(|b| b.user_id == auth.user_id)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Booking not found")))?;

    if booking.status() != BookingStatus::Confirmed {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Booking not cancellable"
        )));
    }

    let slot = state.db.get_slot(booking.slot_id).await?.ok_or_else(|| {
        tracing::error!(booking_id = %booking_id, slot_id = %booking.slot_id, "Booking references missing slot");
        AppError::InternalError(anyhow::anyhow!("Booking references missing slot"))
    })?;

    let cutoff_hours = state.config.booking.cancel_cutoff_hours;
    if slot.start_utc - Utc::now() < Duration::hours(cutoff_hours) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Cancellation not allowed within {} hours of start",
            cutoff_hours
        )));
    }

    if !state.db.cancel_booking(booking_id, reason.as_deref()).await? {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Booking not cancellable"
        )));
    }

    record_cancellation("user");
    state.audit.record(
        "BOOKING_CANCEL",
        Some(auth.user_id),
        "booking",
        Some(booking_id.to_string()),
        Some(json!({ "reason": reason })),
    );

    Ok(Json(json!({ "message": "Cancelled" })))
}

/// Cancel any confirmed booking, bypassing the cutoff and ownership checks.
/// Requires the ADMIN capability from the authorization collaborator.
pub async fn admin_cancel_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<Uuid>,
    payload: Option<Json<CancelBookingRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require_capability(CAPABILITY_ADMIN)?;

    let reason = clean_reason(payload.and_then(|Json(p)| p.reason))
        .unwrap_or_else(|| "Admin cancellation".to_string());

    let booking = state
        .db
        .get_booking(booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Booking not found")))?;

    if booking.status() != BookingStatus::Confirmed {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Booking not cancellable"
        )));
    }

    if !state.db.cancel_booking(booking_id, Some(&reason)).await? {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Booking not cancellable"
        )));
    }

    record_cancellation("admin");
    state.audit.record(
        "ADMIN_BOOKING_CANCEL",
        Some(auth.user_id),
        "booking",
        Some(booking_id.to_string()),
        Some(json!({ "reason": reason, "admin": true })),
    );

    Ok(Json(json!({ "message": "Cancelled by admin" })))
}
