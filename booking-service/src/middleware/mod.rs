mod auth;

pub use auth::{AuthContext, CAPABILITY_ADMIN};
