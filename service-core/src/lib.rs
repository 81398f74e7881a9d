//! service-core: Shared infrastructure for courtslot services.
pub mod error;
pub mod middleware;
pub mod utils;

pub use axum;
pub use serde;
pub use serde_json;
pub use tracing;
pub use validator;
