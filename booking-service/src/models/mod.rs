//! Domain models for the booking engine.

mod booking;
mod court;
mod payment;
mod slot;

pub use booking::{Booking, BookingStatus};
pub use court::{Court, CourtStatus, CreateCourt, normalize_court_field};
pub use payment::{CreatePayment, Payment, PaymentStatus};
pub use slot::{CreateSlot, ListSlotsFilter, Slot};
