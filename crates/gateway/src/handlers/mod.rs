//! API handlers module

pub mod admin;
pub mod health;
pub mod profile;
pub mod publications;
pub mod site;

use scholarpress_common::{
    auth::{MaybeSession, Session},
    db::models::Profile,
    errors::{AppError, Result},
    Actor,
};

use crate::AppState;

/// Load the caller's profile; a verified token without a profile is refused.
pub async fn caller_profile(state: &AppState, session: &Session) -> Result<Profile> {
    state
        .repo
        .find_profile_by_user_id(session.user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden {
            message: "No profile is registered for this account".to_string(),
        })
}

pub async fn actor(state: &AppState, session: &Session) -> Result<Actor> {
    caller_profile(state, session)
        .await
        .map(|profile| Actor::from(&profile))
}

/// Viewer for read endpoints; accounts without a profile browse anonymously.
pub async fn viewer(state: &AppState, session: &MaybeSession) -> Result<Option<Actor>> {
    match session.0 {
        Some(ref session) => Ok(state
            .repo
            .find_profile_by_user_id(session.user_id)
            .await?
            .map(|profile| Actor::from(&profile))),
        None => Ok(None),
    }
}
