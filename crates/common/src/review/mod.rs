//! Publication review workflow
//!
//! - `authority`: which actor may move a publication between statuses
//! - `validation`: required fields for author submissions
//! - `visibility`: which publications a viewer may read
//! - `service`: orchestration over a `PublicationStore`

mod authority;
pub mod service;
mod validation;
pub mod visibility;

pub use authority::{
    apply_transition, authorize_author_edit, decide_initial_status, initial_published_at,
    AuthorAction, Decision, LedgerEntry, PublishedAt, ReviewOutcome, Subject, TransitionError,
    TransitionPlan,
};
pub use service::{NewPublication, PublicationService, PublicationStore};
pub use validation::{
    number_co_authors, validate_profile, validate_submission, CoAuthor, ProfileInput,
    SubmissionInput, ValidSubmission, FIRST_CO_AUTHOR_POSITION,
};
pub use visibility::{can_see_reviews, can_view, VisibilityScope};
