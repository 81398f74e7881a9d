//! Slot model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bookable time window on a court.
///
/// A slot does not record whether it is booked; availability is always
/// derived from the booking ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Slot {
    pub slot_id: Uuid,
    pub court_id: Uuid,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    /// Price in the smallest currency unit.
    pub price: i64,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a slot.
#[derive(Debug, Clone)]
pub struct CreateSlot {
    pub court_id: Uuid,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub price: i64,
}

/// Filter parameters for the availability listing.
#[derive(Debug, Clone, Default)]
pub struct ListSlotsFilter {
    pub court_id: Option<Uuid>,
    /// Restricts to slots starting within this UTC day.
    pub date: Option<NaiveDate>,
}
