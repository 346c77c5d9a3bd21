//! In-memory collaborators for unit tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::db::models::{Publication, PublicationReview};
use crate::errors::{AppError, Result};
use crate::review::service::{NewPublication, PublicationStore};
use crate::review::{Decision, TransitionPlan, ValidSubmission};
use crate::storage::BlobStore;

#[derive(Default)]
struct Tables {
    publications: HashMap<Uuid, Publication>,
    co_authors: HashMap<Uuid, Vec<(i32, String)>>,
    reviews: Vec<PublicationReview>,
    fail_ledger: bool,
}

/// `PublicationStore` backed by hash maps; each call holds the lock for its
/// whole duration, which makes every method atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn get(&self, id: Uuid) -> Publication {
        self.tables.lock().unwrap().publications[&id].clone()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().unwrap().publications.len()
    }

    pub fn co_authors(&self, id: Uuid) -> Vec<String> {
        let tables = self.tables.lock().unwrap();
        let mut rows = tables.co_authors.get(&id).cloned().unwrap_or_default();
        rows.sort_by_key(|(position, _)| *position);
        rows.into_iter().map(|(_, name)| name).collect()
    }

    /// Ledger rows for `id`, oldest first
    pub fn reviews(&self, id: Uuid) -> Vec<PublicationReview> {
        let tables = self.tables.lock().unwrap();
        tables
            .reviews
            .iter()
            .filter(|r| r.publication_id == id)
            .cloned()
            .collect()
    }

    /// Make every ledger append fail
    pub fn fail_ledger_writes(&self, fail: bool) {
        self.tables.lock().unwrap().fail_ledger = fail;
    }
}

fn apply_plan(publication: &mut Publication, plan: &TransitionPlan) -> Result<()> {
    if publication.status != plan.from {
        return Err(AppError::InvalidTransition {
            from: publication.status.to_string(),
            decision: plan.decision.to_string(),
        });
    }
    publication.status = plan.to;
    publication.published_at = plan.published_at.resolve(publication.published_at);
    publication.updated_at = plan.at.into();
    Ok(())
}

#[async_trait]
impl PublicationStore for MemoryStore {
    async fn find_publication(&self, id: Uuid) -> Result<Option<Publication>> {
        Ok(self.tables.lock().unwrap().publications.get(&id).cloned())
    }

    async fn insert_publication(&self, new: NewPublication) -> Result<Publication> {
        let mut tables = self.tables.lock().unwrap();
        let publication = Publication {
            id: Uuid::new_v4(),
            author_id: new.author_id,
            title: new.fields.title,
            summary: new.fields.summary,
            content: new.fields.content,
            keywords: new.fields.keywords,
            file_path: None,
            status: new.status,
            published_at: new.published_at.map(Into::into),
            created_at: new.created_at.into(),
            updated_at: new.created_at.into(),
        };
        let co_authors = new
            .fields
            .co_authors
            .into_iter()
            .map(|c| (c.position, c.name))
            .collect();
        tables.co_authors.insert(publication.id, co_authors);
        tables.publications.insert(publication.id, publication.clone());
        Ok(publication)
    }

    async fn save_edit(
        &self,
        id: Uuid,
        fields: &ValidSubmission,
        plan: &TransitionPlan,
    ) -> Result<Publication> {
        let mut tables = self.tables.lock().unwrap();
        let mut publication = tables
            .publications
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::PublicationNotFound { id: id.to_string() })?;

        apply_plan(&mut publication, plan)?;
        publication.title = fields.title.clone();
        publication.summary = fields.summary.clone();
        publication.content = fields.content.clone();
        publication.keywords = fields.keywords.clone();

        let co_authors = fields
            .co_authors
            .iter()
            .map(|c| (c.position, c.name.clone()))
            .collect();
        tables.co_authors.insert(id, co_authors);
        tables.publications.insert(id, publication.clone());
        Ok(publication)
    }

    async fn commit_transition(&self, id: Uuid, plan: &TransitionPlan) -> Result<Publication> {
        let mut tables = self.tables.lock().unwrap();
        let mut publication = tables
            .publications
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::PublicationNotFound { id: id.to_string() })?;

        apply_plan(&mut publication, plan)?;

        if let Some(entry) = &plan.ledger {
            if tables.fail_ledger {
                return Err(AppError::Transaction {
                    message: "ledger insert failed".to_string(),
                });
            }
            tables.reviews.push(PublicationReview {
                id: Uuid::new_v4(),
                publication_id: id,
                reviewer_id: entry.reviewer_id,
                decision: entry.decision,
                justification: entry.justification.clone(),
                created_at: plan.at.into(),
            });
        }

        tables.publications.insert(id, publication.clone());
        Ok(publication)
    }

    async fn set_file_path(&self, id: Uuid, file_path: String) -> Result<Publication> {
        let mut tables = self.tables.lock().unwrap();
        let publication = tables
            .publications
            .get_mut(&id)
            .ok_or_else(|| AppError::PublicationNotFound { id: id.to_string() })?;
        if !publication.status.is_editable() {
            return Err(AppError::InvalidTransition {
                from: publication.status.to_string(),
                decision: Decision::SaveDraft.to_string(),
            });
        }
        publication.file_path = Some(file_path);
        publication.updated_at = Utc::now().into();
        Ok(publication.clone())
    }
}

/// `BlobStore` that keeps objects in memory
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, _content_type: &str, upsert: bool) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        if !upsert && objects.contains_key(key) {
            return Err(AppError::Storage {
                message: format!("object {} already exists", key),
            });
        }
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://public/{}", key)
    }
}

/// A one-page PDF
pub fn sample_pdf() -> Vec<u8> {
    use lopdf::{dictionary, Document, Object};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[test]
fn sample_pdf_is_accepted() {
    let info = crate::storage::inspect_pdf(&sample_pdf(), usize::MAX).unwrap();
    assert_eq!(info.pages, 1);
}
