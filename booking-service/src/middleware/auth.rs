//! Actor context extracted from request headers.
//!
//! Identity and session handling live in an upstream collaborator; by the
//! time a request reaches this service it carries a resolved user id in
//! `x-user-id` and an optional capability list in `x-capabilities`. The
//! upstream edge strips and re-issues these headers, which is what makes
//! them trustworthy here.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

/// Capability granting platform-operator actions.
pub const CAPABILITY_ADMIN: &str = "ADMIN";

/// Resolved caller identity.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    capabilities: Vec<String>,
}

impl AuthContext {
    pub fn new(user_id: Uuid, capabilities: Vec<String>) -> Self {
        Self {
            user_id,
            capabilities,
        }
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    pub fn require_capability(&self, capability: &str) -> Result<(), AppError> {
        if self.has_capability(capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!("Forbidden")))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;

        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid user id")))?;

        let capabilities = parts
            .headers
            .get("x-capabilities")
            .and_then(|v| v.to_str().ok())
            .map(|value| {
                value
                    .split(',')
                    .map(|c| c.trim().to_uppercase())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(AuthContext::new(user_id, capabilities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_check_is_exact() {
        let ctx = AuthContext::new(Uuid::new_v4(), vec!["ADMIN".to_string()]);
        assert!(ctx.has_capability(CAPABILITY_ADMIN));
        assert!(!ctx.has_capability("SUPER_ADMIN"));
    }

    #[test]
    fn missing_capability_is_forbidden() {
        let ctx = AuthContext::new(Uuid::new_v4(), vec![]);
        assert!(matches!(
            ctx.require_capability(CAPABILITY_ADMIN),
            Err(AppError::Forbidden(_))
        ));
    }
}
