pub mod audit;
pub mod database;
pub mod metrics;
pub mod stripe;

pub use audit::AuditRecorder;
pub use database::{Database, SettlementOutcome};
pub use stripe::{CheckoutMetadata, StripeClient};
