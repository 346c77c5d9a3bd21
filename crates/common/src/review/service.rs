//! Publication workflow service
//!
//! Every mutation goes through [`decide_initial_status`] or
//! [`apply_transition`]; the store is only asked to commit plans that the
//! authority produced.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::authority::{
    apply_transition, authorize_author_edit, decide_initial_status, initial_published_at,
    AuthorAction, Decision, ReviewOutcome, TransitionPlan,
};
use super::validation::{validate_submission, SubmissionInput, ValidSubmission};
use crate::auth::Actor;
use crate::config::SubmissionMode;
use crate::db::models::{Publication, PublicationStatus};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::storage::{inspect_pdf, publication_file_key, BlobStore, PDF_CONTENT_TYPE};

/// Row to insert for a brand-new publication
#[derive(Debug, Clone)]
pub struct NewPublication {
    pub author_id: Uuid,
    pub fields: ValidSubmission,
    pub status: PublicationStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Persistence operations the workflow needs.
///
/// Implementations must apply each method atomically: either every row it
/// touches changes, or none does.
#[async_trait]
pub trait PublicationStore: Send + Sync {
    async fn find_publication(&self, id: Uuid) -> Result<Option<Publication>>;

    /// Insert the publication and its secondary authors
    async fn insert_publication(&self, publication: NewPublication) -> Result<Publication>;

    /// Overwrite the author fields, replace the secondary authors and apply
    /// the status change in `plan`.
    async fn save_edit(
        &self,
        id: Uuid,
        fields: &ValidSubmission,
        plan: &TransitionPlan,
    ) -> Result<Publication>;

    /// Apply the status change in `plan` and append its ledger entry, if any.
    ///
    /// Fails with `InvalidTransition` when the stored status is no longer
    /// `plan.from`.
    async fn commit_transition(&self, id: Uuid, plan: &TransitionPlan) -> Result<Publication>;

    /// Record the public URL of the attached file. Only draft and returned
    /// publications accept one; anything else is an `InvalidTransition`.
    async fn set_file_path(&self, id: Uuid, file_path: String) -> Result<Publication>;
}

/// Orchestrates validation, authority decisions and persistence
pub struct PublicationService<S> {
    store: S,
    blobs: Option<Arc<dyn BlobStore>>,
    mode: SubmissionMode,
    max_upload_bytes: usize,
}

impl<S: PublicationStore> PublicationService<S> {
    pub fn new(store: S, mode: SubmissionMode) -> Self {
        Self {
            store,
            blobs: None,
            mode,
            max_upload_bytes: usize::MAX,
        }
    }

    /// Enable file attachments
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>, max_upload_bytes: usize) -> Self {
        self.blobs = Some(blobs);
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn mode(&self) -> SubmissionMode {
        self.mode
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn load(&self, id: Uuid) -> Result<Publication> {
        self.store
            .find_publication(id)
            .await?
            .ok_or_else(|| AppError::PublicationNotFound { id: id.to_string() })
    }

    /// Create a publication as a draft or submit it straight away.
    ///
    /// In PDF mode a submission cannot carry its file yet, so only drafts
    /// may be created; the file is attached before submitting.
    pub async fn create(
        &self,
        actor: &Actor,
        input: &SubmissionInput,
        action: AuthorAction,
    ) -> Result<Publication> {
        let file_pending = self.mode == SubmissionMode::Pdf && action == AuthorAction::Draft;
        let fields = validate_submission(input, file_pending, self.mode)?;

        let now = Utc::now();
        let status = decide_initial_status(actor, action);
        let publication = self
            .store
            .insert_publication(NewPublication {
                author_id: actor.profile_id,
                fields,
                status,
                published_at: initial_published_at(status, now),
                created_at: now,
            })
            .await?;

        metrics::record_transition(None, status, false);
        info!(
            publication_id = %publication.id,
            actor = %actor.profile_id,
            to = %status,
            "Publication created"
        );

        Ok(publication)
    }

    /// Author edit: overwrite the fields and save as draft or (re)submit.
    pub async fn edit(
        &self,
        actor: &Actor,
        id: Uuid,
        input: &SubmissionInput,
        action: AuthorAction,
    ) -> Result<Publication> {
        let current = self.load(id).await?;
        let file_pending = self.mode == SubmissionMode::Pdf && action == AuthorAction::Draft;
        let has_file = current.file_path.is_some() || file_pending;
        let fields = validate_submission(input, has_file, self.mode)?;

        let plan = apply_transition(actor, (&current).into(), action.into(), None, Utc::now())?;
        let updated = self.store.save_edit(id, &fields, &plan).await?;

        self.committed(actor, id, &plan);
        Ok(updated)
    }

    /// Administrator verdict on a publication in `pending` or `returned`.
    pub async fn review(
        &self,
        actor: &Actor,
        id: Uuid,
        outcome: ReviewOutcome,
        justification: &str,
    ) -> Result<Publication> {
        self.decide(actor, id, outcome.into(), Some(justification)).await
    }

    /// Withdraw an approved publication from public view.
    pub async fn retain(&self, actor: &Actor, id: Uuid, reason: &str) -> Result<Publication> {
        self.decide(actor, id, Decision::Retain, Some(reason)).await
    }

    /// Put a retained publication back on the public list.
    pub async fn republish(&self, actor: &Actor, id: Uuid) -> Result<Publication> {
        self.decide(actor, id, Decision::Republish, None).await
    }

    async fn decide(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
        justification: Option<&str>,
    ) -> Result<Publication> {
        let current = self.load(id).await?;
        let plan = apply_transition(actor, (&current).into(), decision, justification, Utc::now())?;
        let updated = self.store.commit_transition(id, &plan).await?;

        self.committed(actor, id, &plan);
        Ok(updated)
    }

    /// Upload a PDF and attach it to a publication the actor may edit.
    pub async fn attach_file(&self, actor: &Actor, id: Uuid, bytes: Vec<u8>) -> Result<Publication> {
        let blobs = self.blobs.as_ref().ok_or_else(|| AppError::ServiceUnavailable {
            message: "File uploads are not configured".to_string(),
        })?;

        let current = self.load(id).await?;
        authorize_author_edit(actor, (&current).into())?;

        let info = inspect_pdf(&bytes, self.max_upload_bytes)?;
        let key = publication_file_key(current.author_id, current.id);

        if let Err(e) = blobs.upload(&key, bytes, PDF_CONTENT_TYPE, true).await {
            metrics::record_upload(info.bytes, false);
            warn!(publication_id = %id, key = %key, error = %e, "File upload failed");
            return Err(e);
        }
        metrics::record_upload(info.bytes, true);

        let updated = self.store.set_file_path(id, blobs.public_url(&key)).await?;
        info!(
            publication_id = %id,
            actor = %actor.profile_id,
            pages = info.pages,
            "File attached"
        );
        Ok(updated)
    }

    fn committed(&self, actor: &Actor, id: Uuid, plan: &TransitionPlan) {
        metrics::record_transition(Some(plan.from), plan.to, plan.ledger.is_some());
        info!(
            publication_id = %id,
            actor = %actor.profile_id,
            decision = %plan.decision,
            from = %plan.from,
            to = %plan.to,
            "Publication transition committed"
        );
    }
}
