//! Own profile handlers

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::handlers::caller_profile;
use crate::AppState;
use scholarpress_common::{
    auth::Session,
    db::models::Profile,
    errors::Result,
    review::{validate_profile, ProfileInput},
};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 200))]
    pub full_name: String,

    #[validate(length(max = 100))]
    pub display_name: String,

    #[validate(length(max = 300))]
    pub institution: String,
}

pub async fn get_profile(State(state): State<AppState>, session: Session) -> Result<Json<Profile>> {
    Ok(Json(caller_profile(&state, &session).await?))
}

/// Update the editable profile fields; all three must be non-blank.
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>> {
    request.validate()?;
    let input = validate_profile(&ProfileInput {
        full_name: request.full_name,
        display_name: request.display_name,
        institution: request.institution,
    })?;

    let profile = caller_profile(&state, &session).await?;
    let updated = state.repo.update_profile(profile.id, &input).await?;

    tracing::info!(profile_id = %updated.id, "Profile updated");
    Ok(Json(updated))
}
