//! Court (venue) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Court verification status.
///
/// Only VERIFIED courts can host bookable slots; the transition between
/// states is driven by an external verification workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourtStatus {
    Pending,
    Verified,
    Rejected,
}

impl CourtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourtStatus::Pending => "PENDING",
            CourtStatus::Verified => "VERIFIED",
            CourtStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "VERIFIED" => CourtStatus::Verified,
            "REJECTED" => CourtStatus::Rejected,
            _ => CourtStatus::Pending,
        }
    }
}

/// Normalization applied to the name/location pair before the uniqueness
/// check: trimmed, lowercased.
pub fn normalize_court_field(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Court (venue).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Court {
    pub court_id: Uuid,
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub name_normalized: String,
    #[serde(skip_serializing)]
    pub location_normalized: String,
    pub status: String,
    pub owner_user_id: Uuid,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

impl Court {
    pub fn status(&self) -> CourtStatus {
        CourtStatus::from_string(&self.status)
    }

    /// Whether this court may host bookable slots.
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.status() == CourtStatus::Verified
    }
}

/// Input for registering a court.
#[derive(Debug, Clone)]
pub struct CreateCourt {
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub owner_user_id: Uuid,
}
