//! Editorial handlers
//!
//! Dashboards require an administrator up front. The mutations leave the
//! role check to the review workflow so every decision is authorized in
//! one place.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::handlers::actor;
use crate::AppState;
use scholarpress_common::{
    auth::Session,
    db::{
        models::{Publication, PublicationStatus},
        AuditEntry, PublicationCard, RetainedEntry, StatusCount,
    },
    errors::Result,
    review::ReviewOutcome,
};

/// Default and maximum number of audit rows returned
const AUDIT_PAGE: u64 = 200;

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    pub decision: ReviewOutcome,

    #[serde(default)]
    #[validate(length(max = 5000))]
    pub justification: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RetainRequest {
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub justification: String,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub decision: Option<PublicationStatus>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: u64,
    pub by_status: Vec<StatusCount>,
}

/// Pending and returned publications, oldest first
pub async fn queue(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<PublicationCard>>> {
    actor(&state, &session).await?.require_admin()?;
    Ok(Json(state.repo.admin_queue().await?))
}

pub async fn stats(State(state): State<AppState>, session: Session) -> Result<Json<StatsResponse>> {
    actor(&state, &session).await?.require_admin()?;

    let by_status = state.repo.status_counts().await?;
    let total = by_status.iter().map(|c| c.count).sum();
    Ok(Json(StatsResponse { total, by_status }))
}

pub async fn retained(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<RetainedEntry>>> {
    actor(&state, &session).await?.require_admin()?;
    Ok(Json(state.repo.retained_publications().await?))
}

/// Review ledger, newest first
pub async fn audit_log(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>> {
    actor(&state, &session).await?.require_admin()?;

    let limit = query.limit.unwrap_or(AUDIT_PAGE).clamp(1, AUDIT_PAGE);
    Ok(Json(state.repo.audit_log(query.decision, limit).await?))
}

/// Approve, reject or return a publication under review
pub async fn review(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<Publication>> {
    request.validate()?;
    let actor = actor(&state, &session).await?;

    let publication = state
        .publications
        .review(&actor, id, request.decision, &request.justification)
        .await?;
    Ok(Json(publication))
}

/// Withdraw an approved publication from the public list
pub async fn retain(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(request): Json<RetainRequest>,
) -> Result<Json<Publication>> {
    request.validate()?;
    let actor = actor(&state, &session).await?;

    let publication = state
        .publications
        .retain(&actor, id, &request.justification)
        .await?;
    Ok(Json(publication))
}

pub async fn republish(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Publication>> {
    let actor = actor(&state, &session).await?;
    Ok(Json(state.publications.republish(&actor, id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_request_defaults_to_blank_justification() {
        let request: ReviewRequest =
            serde_json::from_value(serde_json::json!({ "decision": "returned" })).unwrap();
        assert_eq!(request.decision, ReviewOutcome::Returned);
        assert!(request.justification.is_empty());
    }

    #[test]
    fn test_review_request_rejects_unknown_decision() {
        let parsed: std::result::Result<ReviewRequest, _> =
            serde_json::from_value(serde_json::json!({ "decision": "retained", "justification": "x" }));
        assert!(parsed.is_err());
    }
}
