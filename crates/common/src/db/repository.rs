//! Repository pattern for database operations
//!
//! Read queries for the catalogue and dashboards, plus the transactional
//! write path behind [`PublicationStore`].

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{extension::postgres::PgExpr, Expr, NullOrdering};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    Iterable, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::review::{
    CoAuthor, Decision, NewPublication, ProfileInput, PublicationStore, PublishedAt,
    TransitionPlan, ValidSubmission, VisibilityScope,
};

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

/// Publication with its author and ordered secondary authors
#[derive(Debug, Clone, Serialize)]
pub struct PublicationCard {
    #[serde(flatten)]
    pub publication: Publication,
    pub author: Option<Profile>,
    pub co_authors: Vec<String>,
}

/// Ledger row with the reviewer's profile
#[derive(Debug, Clone, Serialize)]
pub struct ReviewEntry {
    #[serde(flatten)]
    pub review: PublicationReview,
    pub reviewer: Option<Profile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicationDetail {
    #[serde(flatten)]
    pub card: PublicationCard,
    /// Newest first; `None` when the viewer may not see the history
    pub reviews: Option<Vec<ReviewEntry>>,
}

/// Row of the author's own list
#[derive(Debug, Clone, Serialize)]
pub struct OwnPublication {
    #[serde(flatten)]
    pub publication: Publication,
    /// Latest review when the status carries feedback
    pub latest_review: Option<PublicationReview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetainedEntry {
    #[serde(flatten)]
    pub publication: Publication,
    pub retention: Option<ReviewEntry>,
}

/// Ledger row joined with the publication title and reviewer
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    #[serde(flatten)]
    pub review: PublicationReview,
    pub publication_title: Option<String>,
    pub reviewer: Option<Profile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: PublicationStatus,
    pub count: u64,
}

/// Escape LIKE metacharacters and wrap for a substring match
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Case-insensitive substring match over any of `columns`
fn text_search(query: &str, columns: &[PublicationColumn]) -> Condition {
    let pattern = like_pattern(query.trim());
    columns.iter().fold(Condition::any(), |cond, column| {
        cond.add(Expr::col((PublicationEntity, *column)).ilike(pattern.clone()))
    })
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Profile Operations
    // ========================================================================

    /// Find the profile of an identity-provider user
    pub async fn find_profile_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>> {
        ProfileEntity::find()
            .filter(ProfileColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Overwrite the editable profile fields
    pub async fn update_profile(&self, profile_id: Uuid, input: &ProfileInput) -> Result<Profile> {
        let mut profile: ProfileActiveModel = ProfileEntity::find_by_id(profile_id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::ProfileNotFound {
                user_id: profile_id.to_string(),
            })?
            .into();

        profile.full_name = Set(input.full_name.clone());
        profile.display_name = Set(input.display_name.clone());
        profile.institution = Set(input.institution.clone());
        profile.updated_at = Set(Utc::now().into());

        profile.update(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Site Configuration
    // ========================================================================

    pub async fn site_config(&self) -> Result<Option<SiteConfig>> {
        SiteConfigEntity::find()
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Catalogue
    // ========================================================================

    /// Visible publications, newest publication date first
    pub async fn list_publications(
        &self,
        scope: VisibilityScope,
        query: Option<&str>,
        page: u64,
        page_size: u64,
    ) -> Result<Page<PublicationCard>> {
        let mut select = PublicationEntity::find().filter(scope.condition());

        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            select = select.filter(text_search(
                q,
                &[
                    PublicationColumn::Title,
                    PublicationColumn::Summary,
                    PublicationColumn::Keywords,
                ],
            ));
        }

        let paginator = select
            .order_by_with_nulls(PublicationColumn::PublishedAt, Order::Desc, NullOrdering::Last)
            .order_by_desc(PublicationColumn::CreatedAt)
            .paginate(self.read_conn(), page_size.max(1));

        let total = paginator.num_items().await?;
        let items = match page_offset(page, page_size.max(1)) {
            Some(offset) if offset < total => {
                let publications = paginator.fetch_page(page).await?;
                self.cards(publications).await?
            }
            _ => Vec::new(),
        };

        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Site-wide search over approved publications
    pub async fn search_approved(&self, query: &str, limit: u64) -> Result<Vec<PublicationCard>> {
        let publications = PublicationEntity::find()
            .filter(PublicationColumn::Status.eq(PublicationStatus::Approved))
            .filter(text_search(
                query,
                &[
                    PublicationColumn::Title,
                    PublicationColumn::Summary,
                    PublicationColumn::Content,
                ],
            ))
            .order_by_with_nulls(PublicationColumn::PublishedAt, Order::Desc, NullOrdering::Last)
            .limit(limit)
            .all(self.read_conn())
            .await?;

        debug!(query, hits = publications.len(), "Site search");
        self.cards(publications).await
    }

    /// The author's own publications, newest first
    pub async fn my_publications(&self, author_id: Uuid) -> Result<Vec<OwnPublication>> {
        let publications = PublicationEntity::find()
            .filter(PublicationColumn::AuthorId.eq(author_id))
            .order_by_desc(PublicationColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        let with_feedback: Vec<Uuid> = publications
            .iter()
            .filter(|p| p.status.carries_feedback())
            .map(|p| p.id)
            .collect();
        let mut latest = self.latest_reviews(&with_feedback, None).await?;

        Ok(publications
            .into_iter()
            .map(|publication| {
                let latest_review = if publication.status.carries_feedback() {
                    latest.remove(&publication.id)
                } else {
                    None
                };
                OwnPublication {
                    publication,
                    latest_review,
                }
            })
            .collect())
    }

    /// Publication with its authors and, when requested, its review history
    pub async fn publication_detail(
        &self,
        publication: Publication,
        include_reviews: bool,
    ) -> Result<PublicationDetail> {
        let reviews = if include_reviews {
            Some(self.reviews_for(publication.id).await?)
        } else {
            None
        };

        let card = self
            .cards(vec![publication])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal {
                message: "publication card missing".to_string(),
            })?;

        Ok(PublicationDetail { card, reviews })
    }

    /// Ledger of one publication, newest first
    pub async fn reviews_for(&self, publication_id: Uuid) -> Result<Vec<ReviewEntry>> {
        let rows = PublicationReviewEntity::find()
            .filter(PublicationReviewColumn::PublicationId.eq(publication_id))
            .order_by_desc(PublicationReviewColumn::CreatedAt)
            .find_also_related(ProfileEntity)
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(review, reviewer)| ReviewEntry { review, reviewer })
            .collect())
    }

    /// Publications awaiting a decision, oldest first
    pub async fn admin_queue(&self) -> Result<Vec<PublicationCard>> {
        let publications = PublicationEntity::find()
            .filter(
                PublicationColumn::Status
                    .is_in([PublicationStatus::Pending, PublicationStatus::Returned]),
            )
            .order_by_asc(PublicationColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        self.cards(publications).await
    }

    /// Retained publications with the decision that withdrew them
    pub async fn retained_publications(&self) -> Result<Vec<RetainedEntry>> {
        let publications = PublicationEntity::find()
            .filter(PublicationColumn::Status.eq(PublicationStatus::Retained))
            .order_by_desc(PublicationColumn::UpdatedAt)
            .all(self.read_conn())
            .await?;

        let ids: Vec<Uuid> = publications.iter().map(|p| p.id).collect();
        let mut latest = self
            .latest_reviews(&ids, Some(PublicationStatus::Retained))
            .await?;

        let reviewer_ids: Vec<Uuid> = latest.values().map(|r| r.reviewer_id).collect();
        let reviewers = self.profiles_by_id(&reviewer_ids).await?;

        Ok(publications
            .into_iter()
            .map(|publication| {
                let retention = latest.remove(&publication.id).map(|review| ReviewEntry {
                    reviewer: reviewers.get(&review.reviewer_id).cloned(),
                    review,
                });
                RetainedEntry {
                    publication,
                    retention,
                }
            })
            .collect())
    }

    /// All ledger entries, newest first, optionally for one decision
    pub async fn audit_log(
        &self,
        decision: Option<PublicationStatus>,
        limit: u64,
    ) -> Result<Vec<AuditEntry>> {
        let mut select = PublicationReviewEntity::find();
        if let Some(decision) = decision {
            select = select.filter(PublicationReviewColumn::Decision.eq(decision));
        }

        let rows = select
            .order_by_desc(PublicationReviewColumn::CreatedAt)
            .limit(limit)
            .find_also_related(PublicationEntity)
            .all(self.read_conn())
            .await?;

        let reviewer_ids: Vec<Uuid> = rows.iter().map(|(r, _)| r.reviewer_id).collect();
        let reviewers = self.profiles_by_id(&reviewer_ids).await?;

        Ok(rows
            .into_iter()
            .map(|(review, publication)| AuditEntry {
                publication_title: publication.map(|p| p.title),
                reviewer: reviewers.get(&review.reviewer_id).cloned(),
                review,
            })
            .collect())
    }

    /// Number of publications in each status
    pub async fn status_counts(&self) -> Result<Vec<StatusCount>> {
        let mut counts = Vec::new();
        for status in PublicationStatus::iter() {
            let count = PublicationEntity::find()
                .filter(PublicationColumn::Status.eq(status))
                .count(self.read_conn())
                .await?;
            counts.push(StatusCount { status, count });
        }
        Ok(counts)
    }

    // ========================================================================
    // Join helpers
    // ========================================================================

    async fn profiles_by_id(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Profile>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let profiles = ProfileEntity::find()
            .filter(ProfileColumn::Id.is_in(ids.iter().copied()))
            .all(self.read_conn())
            .await?;
        Ok(profiles.into_iter().map(|p| (p.id, p)).collect())
    }

    /// Attach authors and secondary authors, preserving input order
    async fn cards(&self, publications: Vec<Publication>) -> Result<Vec<PublicationCard>> {
        if publications.is_empty() {
            return Ok(Vec::new());
        }

        let author_ids: Vec<Uuid> = publications.iter().map(|p| p.author_id).collect();
        let authors = self.profiles_by_id(&author_ids).await?;

        let ids: Vec<Uuid> = publications.iter().map(|p| p.id).collect();
        let rows = PublicationAuthorEntity::find()
            .filter(PublicationAuthorColumn::PublicationId.is_in(ids))
            .order_by_asc(PublicationAuthorColumn::AuthorOrder)
            .all(self.read_conn())
            .await?;

        let mut co_authors: HashMap<Uuid, Vec<String>> = HashMap::new();
        for row in rows {
            co_authors
                .entry(row.publication_id)
                .or_default()
                .push(row.author_name);
        }

        Ok(publications
            .into_iter()
            .map(|publication| PublicationCard {
                author: authors.get(&publication.author_id).cloned(),
                co_authors: co_authors.remove(&publication.id).unwrap_or_default(),
                publication,
            })
            .collect())
    }

    /// Newest ledger row per publication
    async fn latest_reviews(
        &self,
        publication_ids: &[Uuid],
        decision: Option<PublicationStatus>,
    ) -> Result<HashMap<Uuid, PublicationReview>> {
        if publication_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut select = PublicationReviewEntity::find().filter(
            PublicationReviewColumn::PublicationId.is_in(publication_ids.iter().copied()),
        );
        if let Some(decision) = decision {
            select = select.filter(PublicationReviewColumn::Decision.eq(decision));
        }

        let rows = select
            .order_by_desc(PublicationReviewColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        let mut latest = HashMap::new();
        for row in rows {
            latest.entry(row.publication_id).or_insert(row);
        }
        Ok(latest)
    }
}

// ============================================================================
// Write path
// ============================================================================

async fn insert_co_authors<C: ConnectionTrait>(
    conn: &C,
    publication_id: Uuid,
    co_authors: &[CoAuthor],
) -> Result<()> {
    if co_authors.is_empty() {
        return Ok(());
    }
    let now = Utc::now();
    let rows = co_authors.iter().map(|c| PublicationAuthorActiveModel {
        id: Set(Uuid::new_v4()),
        publication_id: Set(publication_id),
        author_name: Set(c.name.clone()),
        author_order: Set(c.position),
        created_at: Set(now.into()),
    });
    PublicationAuthorEntity::insert_many(rows).exec(conn).await?;
    Ok(())
}

/// Row offset of a zero-based page; `None` when it overflows.
fn page_offset(page: u64, page_size: u64) -> Option<u64> {
    page.checked_mul(page_size)
}

/// Conditional status update; returns the refreshed row.
///
/// Matches only while the stored status still equals `plan.from`, so two
/// concurrent decisions cannot both commit.
async fn update_status<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    plan: &TransitionPlan,
    fields: Option<&ValidSubmission>,
) -> Result<Publication> {
    let mut update = PublicationEntity::update_many()
        .col_expr(
            PublicationColumn::Status,
            PublicationColumn::Status.save_as(Expr::val(plan.to.as_str())),
        )
        .col_expr(
            PublicationColumn::UpdatedAt,
            Expr::value(DateTimeWithTimeZone::from(plan.at)),
        );

    if plan.published_at != PublishedAt::Keep {
        let published_at: Option<DateTimeWithTimeZone> = plan.published_at.resolve(None);
        update = update.col_expr(PublicationColumn::PublishedAt, Expr::value(published_at));
    }

    if let Some(fields) = fields {
        update = update
            .col_expr(PublicationColumn::Title, Expr::value(fields.title.clone()))
            .col_expr(PublicationColumn::Summary, Expr::value(fields.summary.clone()))
            .col_expr(PublicationColumn::Content, Expr::value(fields.content.clone()))
            .col_expr(PublicationColumn::Keywords, Expr::value(fields.keywords.clone()));
    }

    let result = update
        .filter(PublicationColumn::Id.eq(id))
        .filter(PublicationColumn::Status.eq(plan.from))
        .exec(conn)
        .await?;

    let current = PublicationEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::PublicationNotFound { id: id.to_string() })?;

    if result.rows_affected == 0 {
        return Err(AppError::InvalidTransition {
            from: current.status.to_string(),
            decision: plan.decision.to_string(),
        });
    }

    Ok(current)
}

#[async_trait]
impl PublicationStore for Repository {
    async fn find_publication(&self, id: Uuid) -> Result<Option<Publication>> {
        PublicationEntity::find_by_id(id)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn insert_publication(&self, new: NewPublication) -> Result<Publication> {
        let txn = self.write_conn().begin().await?;

        let publication = PublicationActiveModel {
            id: Set(Uuid::new_v4()),
            author_id: Set(new.author_id),
            title: Set(new.fields.title),
            summary: Set(new.fields.summary),
            content: Set(new.fields.content),
            keywords: Set(new.fields.keywords),
            file_path: Set(None),
            status: Set(new.status),
            published_at: Set(new.published_at.map(Into::into)),
            created_at: Set(new.created_at.into()),
            updated_at: Set(new.created_at.into()),
        }
        .insert(&txn)
        .await?;

        insert_co_authors(&txn, publication.id, &new.fields.co_authors).await?;
        txn.commit().await?;

        Ok(publication)
    }

    async fn save_edit(
        &self,
        id: Uuid,
        fields: &ValidSubmission,
        plan: &TransitionPlan,
    ) -> Result<Publication> {
        let txn = self.write_conn().begin().await?;

        let publication = update_status(&txn, id, plan, Some(fields)).await?;

        PublicationAuthorEntity::delete_many()
            .filter(PublicationAuthorColumn::PublicationId.eq(id))
            .exec(&txn)
            .await?;
        insert_co_authors(&txn, id, &fields.co_authors).await?;

        txn.commit().await?;
        Ok(publication)
    }

    async fn commit_transition(&self, id: Uuid, plan: &TransitionPlan) -> Result<Publication> {
        let txn = self.write_conn().begin().await?;

        let publication = update_status(&txn, id, plan, None).await?;

        if let Some(entry) = &plan.ledger {
            PublicationReviewActiveModel {
                id: Set(Uuid::new_v4()),
                publication_id: Set(id),
                reviewer_id: Set(entry.reviewer_id),
                decision: Set(entry.decision),
                justification: Set(entry.justification.clone()),
                created_at: Set(plan.at.into()),
            }
            .insert(&txn)
            .await
            .map_err(|e| AppError::Transaction {
                message: format!("Failed to append review: {}", e),
            })?;
        }

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: format!("Failed to commit transition: {}", e),
        })?;
        Ok(publication)
    }

    async fn set_file_path(&self, id: Uuid, file_path: String) -> Result<Publication> {
        let conn = self.write_conn();
        let editable: Vec<PublicationStatus> = PublicationStatus::iter()
            .filter(PublicationStatus::is_editable)
            .collect();

        let result = PublicationEntity::update_many()
            .col_expr(PublicationColumn::FilePath, Expr::value(Some(file_path)))
            .col_expr(
                PublicationColumn::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(PublicationColumn::Id.eq(id))
            .filter(PublicationColumn::Status.is_in(editable))
            .exec(conn)
            .await?;

        let current = PublicationEntity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::PublicationNotFound { id: id.to_string() })?;

        // Submitted or decided between the ownership check and the upload
        if result.rows_affected == 0 {
            return Err(AppError::InvalidTransition {
                from: current.status.to_string(),
                decision: Decision::SaveDraft.to_string(),
            });
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    #[test]
    fn test_page_offset_guards_overflow() {
        assert_eq!(page_offset(0, 6), Some(0));
        assert_eq!(page_offset(3, 6), Some(18));
        assert_eq!(page_offset(u64::MAX - 1, 6), None);
        assert_eq!(page_offset(u64::MAX / 6 + 1, 6), None);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ocean"), "%ocean%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_text_search_is_case_insensitive_over_columns() {
        let sql = PublicationEntity::find()
            .filter(text_search(
                "Vent",
                &[PublicationColumn::Title, PublicationColumn::Keywords],
            ))
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains("ILIKE"));
        assert!(sql.contains("\"title\""));
        assert!(sql.contains("\"keywords\""));
        assert!(sql.contains("%Vent%"));
        assert!(sql.contains(" OR "));
    }
}
