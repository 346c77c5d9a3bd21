//! Who may read which publications

use sea_orm::prelude::Uuid;
use sea_orm::{ColumnTrait, Condition};

use crate::auth::Actor;
use crate::db::models::{Publication, PublicationColumn, PublicationStatus};

/// Set of publications a viewer is allowed to see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityScope {
    /// Anonymous visitors
    ApprovedOnly,
    /// Authenticated non-admins: approved work plus their own in any status
    ApprovedOrOwnedBy(Uuid),
    /// Administrators
    All,
}

impl VisibilityScope {
    pub fn for_viewer(viewer: Option<&Actor>) -> Self {
        match viewer {
            None => VisibilityScope::ApprovedOnly,
            Some(actor) if actor.is_admin() => VisibilityScope::All,
            Some(actor) => VisibilityScope::ApprovedOrOwnedBy(actor.profile_id),
        }
    }

    pub fn admits(&self, author_id: Uuid, status: PublicationStatus) -> bool {
        match self {
            VisibilityScope::ApprovedOnly => status == PublicationStatus::Approved,
            VisibilityScope::ApprovedOrOwnedBy(owner) => {
                status == PublicationStatus::Approved || author_id == *owner
            }
            VisibilityScope::All => true,
        }
    }

    /// Filter expressing this scope over the `publications` table
    pub fn condition(&self) -> Condition {
        let approved = PublicationColumn::Status.eq(PublicationStatus::Approved);
        match self {
            VisibilityScope::ApprovedOnly => Condition::all().add(approved),
            VisibilityScope::ApprovedOrOwnedBy(owner) => Condition::any()
                .add(approved)
                .add(PublicationColumn::AuthorId.eq(*owner)),
            VisibilityScope::All => Condition::all(),
        }
    }
}

pub fn can_view(viewer: Option<&Actor>, publication: &Publication) -> bool {
    VisibilityScope::for_viewer(viewer).admits(publication.author_id, publication.status)
}

/// Review history is shown to the author and to administrators only.
pub fn can_see_reviews(viewer: Option<&Actor>, publication: &Publication) -> bool {
    viewer.is_some_and(|actor| actor.is_admin() || actor.owns(publication.author_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{PublicationEntity, UserType};
    use sea_orm::{EntityTrait, Iterable, QueryFilter, QueryTrait};

    fn publication(author_id: Uuid, status: PublicationStatus) -> Publication {
        let now = chrono::Utc::now().into();
        Publication {
            id: Uuid::new_v4(),
            author_id,
            title: "T".into(),
            summary: "S".into(),
            content: "C".into(),
            keywords: None,
            file_path: None,
            status,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_anonymous_sees_only_approved() {
        let author = Uuid::new_v4();
        for status in PublicationStatus::iter() {
            let p = publication(author, status);
            assert_eq!(can_view(None, &p), status == PublicationStatus::Approved);
            assert!(!can_see_reviews(None, &p));
        }
    }

    #[test]
    fn test_author_sees_own_in_any_status() {
        let me = Actor::new(Uuid::new_v4(), UserType::Standard);
        let other = Uuid::new_v4();
        for status in PublicationStatus::iter() {
            assert!(can_view(Some(&me), &publication(me.profile_id, status)));
            assert!(can_see_reviews(Some(&me), &publication(me.profile_id, status)));
            assert_eq!(
                can_view(Some(&me), &publication(other, status)),
                status == PublicationStatus::Approved
            );
            assert!(!can_see_reviews(Some(&me), &publication(other, status)));
        }
    }

    #[test]
    fn test_admin_sees_everything() {
        let admin = Actor::new(Uuid::new_v4(), UserType::Admin);
        for status in PublicationStatus::iter() {
            let p = publication(Uuid::new_v4(), status);
            assert!(can_view(Some(&admin), &p));
            assert!(can_see_reviews(Some(&admin), &p));
        }
    }

    #[test]
    fn test_scope_condition_sql() {
        let owner = Uuid::new_v4();
        let sql = PublicationEntity::find()
            .filter(VisibilityScope::ApprovedOrOwnedBy(owner).condition())
            .build(sea_orm::DbBackend::Postgres)
            .to_string();
        assert!(sql.contains("'approved'"));
        assert!(sql.contains(" OR "));
        assert!(sql.contains(&owner.to_string()));
    }
}
