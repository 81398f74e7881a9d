//! Payment model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment status.
///
/// The transition table is INIT -> PAID and INIT -> FAILED; both PAID and
/// FAILED are terminal. Mutating SQL carries a matching status guard so an
/// illegal transition affects zero rows instead of clobbering a settled
/// payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Init,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Init => "INIT",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "PAID" => PaymentStatus::Paid,
            "FAILED" => PaymentStatus::Failed,
            _ => PaymentStatus::Init,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Init)
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Init, PaymentStatus::Paid)
                | (PaymentStatus::Init, PaymentStatus::Failed)
        )
    }
}

/// One checkout attempt against the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    /// Linked only after settlement succeeds.
    pub booking_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
    pub provider: String,
    /// Amount in the smallest currency unit.
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub gateway_session_id: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub paid_utc: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.status)
    }
}

/// Input for opening a checkout attempt.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub slot_id: Uuid,
    pub provider: String,
    pub amount: i64,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_can_settle_or_fail() {
        assert!(PaymentStatus::Init.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Init.can_transition_to(PaymentStatus::Failed));
    }

    #[test]
    fn terminal_states_are_immutable() {
        for terminal in [PaymentStatus::Paid, PaymentStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in [
                PaymentStatus::Init,
                PaymentStatus::Paid,
                PaymentStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn paid_cannot_revert_to_init() {
        assert!(!PaymentStatus::Paid.can_transition_to(PaymentStatus::Init));
    }

    #[test]
    fn unknown_status_string_parses_as_init() {
        assert_eq!(PaymentStatus::from_string("INIT"), PaymentStatus::Init);
        assert_eq!(PaymentStatus::from_string("garbage"), PaymentStatus::Init);
    }
}
