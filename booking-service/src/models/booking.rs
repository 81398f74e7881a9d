//! Booking model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "CANCELLED" => BookingStatus::Cancelled,
            _ => BookingStatus::Confirmed,
        }
    }
}

/// Confirmed claim on a slot by a user.
///
/// Rows exist only while the claim is live: cancellation deletes the row so
/// the unique slot constraint frees the slot for rebooking. `cancelled_utc`
/// and `cancel_reason` are populated transiently for the audit event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub slot_id: Uuid,
    pub status: String,
    pub cancelled_utc: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Booking {
    pub fn status(&self) -> BookingStatus {
        BookingStatus::from_string(&self.status)
    }
}
