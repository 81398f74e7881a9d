//! Court registration handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::{AuthContext, CAPABILITY_ADMIN};
use crate::models::CreateCourt;
use crate::AppState;

/// Request to register a court.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourtRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 160))]
    pub location: String,
    #[validate(length(min = 1))]
    pub description: String,
    /// Owner to register the court for; defaults to the caller.
    pub owner_user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreateCourtResponse {
    pub court_id: Uuid,
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub status: String,
}

/// Register a new court. Courts start PENDING; the verification workflow
/// that promotes them lives outside this service.
pub async fn create_court(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CreateCourtRequest>,
) -> Result<(StatusCode, Json<CreateCourtResponse>), AppError> {
    auth.require_capability(CAPABILITY_ADMIN)?;
    payload.validate()?;

    let owner_user_id = payload.owner_user_id.unwrap_or(auth.user_id);

    let court = state
        .db
        .create_court(&CreateCourt {
            name: payload.name.trim().to_string(),
            location: payload.location.trim().to_string(),
            description: Some(payload.description.trim().to_string()),
            owner_user_id,
        })
        .await?;

    state.audit.record(
        "COURT_CREATE",
        Some(auth.user_id),
        "court",
        Some(court.court_id.to_string()),
        None,
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateCourtResponse {
            court_id: court.court_id,
            name: court.name,
            location: court.location,
            description: court.description,
            status: court.status,
        }),
    ))
}
