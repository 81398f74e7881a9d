//! Slot handlers: catalog writes and the availability read path.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::{AuthContext, CAPABILITY_ADMIN};
use crate::models::{CreateSlot, ListSlotsFilter, Slot};
use crate::AppState;

/// Request to create a slot.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSlotRequest {
    pub court_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Price in the smallest currency unit.
    #[validate(range(min = 0))]
    pub price: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateSlotResponse {
    pub slot_id: Uuid,
}

/// Query parameters for the availability listing.
#[derive(Debug, Deserialize)]
pub struct ListSlotsQuery {
    pub court_id: Option<Uuid>,
    /// UTC day, `YYYY-MM-DD`.
    pub date: Option<String>,
}

/// One slot with its derived availability.
#[derive(Debug, Serialize)]
pub struct SlotAvailability {
    pub slot_id: Uuid,
    pub court_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: i64,
    pub available: bool,
}

impl SlotAvailability {
    fn from_slot(slot: Slot, available: bool) -> Self {
        Self {
            slot_id: slot.slot_id,
            court_id: slot.court_id,
            start_time: slot.start_utc,
            end_time: slot.end_utc,
            price: slot.price,
            available,
        }
    }
}

/// Create a bookable slot on a verified, active court. Allowed for the
/// court's owner and for platform operators.
pub async fn create_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<CreateSlotResponse>), AppError> {
    payload.validate()?;

    if payload.end_time <= payload.start_time {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "end_time must be after start_time"
        )));
    }

    let court = state
        .db
        .get_court(payload.court_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Court not found")))?;

    if court.status() != crate::models::CourtStatus::Verified {
        return Err(AppError::Forbidden(anyhow::anyhow!("Court not verified")));
    }

    if !auth.has_capability(CAPABILITY_ADMIN) && court.owner_user_id != auth.user_id {
        return Err(AppError::Forbidden(anyhow::anyhow!("Forbidden")));
    }

    let slot = state
        .db
        .create_slot(&CreateSlot {
            court_id: payload.court_id,
            start_utc: payload.start_time,
            end_utc: payload.end_time,
            price: payload.price,
        })
        .await?;

    state.audit.record(
        "SLOT_CREATE",
        Some(auth.user_id),
        "slot",
        Some(slot.slot_id.to_string()),
        None,
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateSlotResponse {
            slot_id: slot.slot_id,
        }),
    ))
}

/// Deactivate a slot so it no longer appears in listings. Existing bookings
/// are untouched.
pub async fn deactivate_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let slot = state
        .db
        .get_slot(slot_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Slot not found")))?;

    let court = state.db.get_court(slot.court_id).await?.ok_or_else(|| {
        tracing::error!(slot_id = %slot_id, court_id = %slot.court_id, "Slot references missing court");
        AppError::InternalError(anyhow::anyhow!("Slot references missing court"))
    })?;

    if !auth.has_capability(CAPABILITY_ADMIN) && court.owner_user_id != auth.user_id {
        return Err(AppError::Forbidden(anyhow::anyhow!("Forbidden")));
    }

    state.db.deactivate_slot(slot_id).await?;

    state.audit.record(
        "SLOT_DEACTIVATE",
        Some(auth.user_id),
        "slot",
        Some(slot_id.to_string()),
        None,
    );

    Ok(Json(serde_json::json!({ "message": "Slot deactivated" })))
}

/// List open slots with derived availability.
///
/// A slot is available iff no CONFIRMED booking references it; this is
/// recomputed against the booking ledger on every call, never cached.
pub async fn list_slots(
    State(state): State<AppState>,
    Query(query): Query<ListSlotsQuery>,
) -> Result<Json<Vec<SlotAvailability>>, AppError> {
    let date = match query.date.as_deref() {
        Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!("Invalid date. Use YYYY-MM-DD"))
        })?),
        None => None,
    };

    let slots = state
        .db
        .list_open_slots(&ListSlotsFilter {
            court_id: query.court_id,
            date,
        })
        .await?;

    let slot_ids: Vec<Uuid> = slots.iter().map(|s| s.slot_id).collect();
    let booked = state.db.confirmed_slot_ids(&slot_ids).await?;

    let listing = slots
        .into_iter()
        .map(|slot| {
            let available = !booked.contains(&slot.slot_id);
            SlotAvailability::from_slot(slot, available)
        })
        .collect();

    Ok(Json(listing))
}
