//! Catalogue and author handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::{actor, viewer};
use crate::AppState;
use scholarpress_common::{
    auth::{MaybeSession, Session},
    db::{models::Publication, OwnPublication, Page, PublicationCard, PublicationDetail},
    errors::{AppError, Result},
    review::{can_see_reviews, can_view, AuthorAction, PublicationStore, SubmissionInput, VisibilityScope},
};

/// Maximum hits returned by the site search
const SEARCH_LIMIT: u64 = 50;

/// Highest page number a listing accepts
const MAX_PAGE: u64 = 100_000;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListQuery {
    #[validate(length(max = 200))]
    pub q: Option<String>,

    /// 1-based page number
    #[validate(range(min = 1, max = MAX_PAGE))]
    pub page: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 200))]
    pub q: String,
}

/// Body of the create and edit forms
#[derive(Debug, Deserialize, Validate)]
pub struct SubmissionRequest {
    #[validate(length(max = 500))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub summary: String,

    #[serde(default)]
    pub content: String,

    #[validate(length(max = 500))]
    pub keywords: Option<String>,

    #[serde(default)]
    #[validate(length(max = 50))]
    pub co_authors: Vec<String>,

    /// `draft` or `submit`
    pub action: AuthorAction,
}

impl SubmissionRequest {
    fn into_parts(self) -> (SubmissionInput, AuthorAction) {
        (
            SubmissionInput {
                title: self.title,
                summary: self.summary,
                content: self.content,
                keywords: self.keywords,
                co_authors: self.co_authors,
            },
            self.action,
        )
    }
}

/// Public list, widened to the viewer's own work and to everything for admins
pub async fn list_publications(
    State(state): State<AppState>,
    session: MaybeSession,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<PublicationCard>>> {
    query.validate()?;
    let viewer = viewer(&state, &session).await?;
    let scope = VisibilityScope::for_viewer(viewer.as_ref());

    let page = query.page.unwrap_or(1).saturating_sub(1);
    let mut listing = state
        .repo
        .list_publications(
            scope,
            query.q.as_deref(),
            page,
            state.config.submission.page_size,
        )
        .await?;
    listing.page = page + 1;

    Ok(Json(listing))
}

/// Site-wide search over approved publications
pub async fn search_publications(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PublicationCard>>> {
    query.validate()?;
    let q = query.q.trim();
    if q.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(state.repo.search_approved(q, SEARCH_LIMIT).await?))
}

/// Detail page; publications the viewer may not see are reported as missing.
pub async fn get_publication(
    State(state): State<AppState>,
    session: MaybeSession,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicationDetail>> {
    let viewer = viewer(&state, &session).await?;
    let not_found = || AppError::PublicationNotFound { id: id.to_string() };

    let publication = state.repo.find_publication(id).await?.ok_or_else(not_found)?;
    if !can_view(viewer.as_ref(), &publication) {
        return Err(not_found());
    }

    let include_reviews = can_see_reviews(viewer.as_ref(), &publication);
    let detail = state
        .repo
        .publication_detail(publication, include_reviews)
        .await?;

    Ok(Json(detail))
}

pub async fn create_publication(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<SubmissionRequest>,
) -> Result<(StatusCode, Json<Publication>)> {
    request.validate()?;
    let actor = actor(&state, &session).await?;
    let (input, action) = request.into_parts();

    let publication = state.publications.create(&actor, &input, action).await?;
    Ok((StatusCode::CREATED, Json(publication)))
}

/// Author edit: save as draft or (re)submit
pub async fn update_publication(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmissionRequest>,
) -> Result<Json<Publication>> {
    request.validate()?;
    let actor = actor(&state, &session).await?;
    let (input, action) = request.into_parts();

    let publication = state.publications.edit(&actor, id, &input, action).await?;
    Ok(Json(publication))
}

/// Raw PDF body attached to a draft or returned publication
pub async fn upload_file(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<Publication>> {
    if body.is_empty() {
        return Err(AppError::MissingField {
            field: "file".to_string(),
        });
    }
    let actor = actor(&state, &session).await?;

    let publication = state
        .publications
        .attach_file(&actor, id, body.to_vec())
        .await?;
    Ok(Json(publication))
}

/// The caller's own publications with the latest feedback on each
pub async fn my_publications(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<OwnPublication>>> {
    let actor = actor(&state, &session).await?;
    Ok(Json(state.repo.my_publications(actor.profile_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_request_accepts_legacy_action_names() {
        let request: SubmissionRequest = serde_json::from_value(serde_json::json!({
            "title": "Tidal mixing",
            "summary": "Observations",
            "action": "publish",
            "co_authors": ["Ada Lovelace"]
        }))
        .unwrap();

        assert_eq!(request.action, AuthorAction::Submit);
        let (input, _) = request.into_parts();
        assert_eq!(input.content, "");
        assert_eq!(input.co_authors, vec!["Ada Lovelace"]);
    }

    #[test]
    fn test_list_query_rejects_page_zero() {
        let query = ListQuery {
            q: None,
            page: Some(0),
        };
        assert!(query.validate().is_err());
        assert!(ListQuery::default().validate().is_ok());
    }

    #[test]
    fn test_list_query_rejects_out_of_range_page() {
        let query = ListQuery {
            q: None,
            page: Some(u64::MAX),
        };
        assert!(query.validate().is_err());

        let last = ListQuery {
            q: None,
            page: Some(MAX_PAGE),
        };
        assert!(last.validate().is_ok());
    }
}
