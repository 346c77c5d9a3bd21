//! Publication transition authority
//!
//! The two entry points, [`decide_initial_status`] and [`apply_transition`],
//! are the only places that decide which actor may move a publication to
//! which status and what must change alongside the status. Both are pure:
//! the caller passes the actor, the current state and the clock, and gets
//! back a plan to commit or a [`TransitionError`].

use chrono::{DateTime, Utc};
use sea_orm::prelude::Uuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::auth::Actor;
use crate::db::models::{Publication, PublicationStatus};

/// What an author asks for when saving the edit form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorAction {
    /// Keep working on it later
    #[serde(alias = "save_draft")]
    Draft,
    /// Send for review (administrators publish directly)
    #[serde(alias = "publish")]
    Submit,
}

/// Verdict an administrator can give on a publication under review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Approved,
    Rejected,
    Returned,
}

/// Every status-changing request the workflow understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    SaveDraft,
    Submit,
    Approve,
    Reject,
    Return,
    Retain,
    Republish,
}

impl Decision {
    /// Decisions that record a ledger entry and therefore need a justification
    pub fn requires_justification(&self) -> bool {
        matches!(
            self,
            Decision::Approve | Decision::Reject | Decision::Return | Decision::Retain
        )
    }

    pub fn is_author_action(&self) -> bool {
        matches!(self, Decision::SaveDraft | Decision::Submit)
    }

    fn verb(&self) -> &'static str {
        match self {
            Decision::SaveDraft => "edit",
            Decision::Submit => "submit",
            Decision::Approve => "approve",
            Decision::Reject => "reject",
            Decision::Return => "return",
            Decision::Retain => "retain",
            Decision::Republish => "republish",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

impl From<AuthorAction> for Decision {
    fn from(action: AuthorAction) -> Self {
        match action {
            AuthorAction::Draft => Decision::SaveDraft,
            AuthorAction::Submit => Decision::Submit,
        }
    }
}

impl From<ReviewOutcome> for Decision {
    fn from(outcome: ReviewOutcome) -> Self {
        match outcome {
            ReviewOutcome::Approved => Decision::Approve,
            ReviewOutcome::Rejected => Decision::Reject,
            ReviewOutcome::Returned => Decision::Return,
        }
    }
}

/// Reasons a transition is refused. Nothing has been written when one of
/// these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("a non-empty justification is required")]
    MissingJustification,

    #[error("only the author may modify this publication")]
    NotAuthor,

    #[error("administrator role required")]
    AdminRequired,

    #[error("cannot {decision} a publication in status {from}")]
    NotAllowed {
        from: PublicationStatus,
        decision: Decision,
    },
}

/// Effect of a transition on `published_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishedAt {
    /// Leave the stored value untouched
    Keep,
    Set(DateTime<Utc>),
    Clear,
}

impl PublishedAt {
    /// Value the column holds after the transition
    pub fn resolve<T: From<DateTime<Utc>>>(self, current: Option<T>) -> Option<T> {
        match self {
            PublishedAt::Keep => current,
            PublishedAt::Set(at) => Some(at.into()),
            PublishedAt::Clear => None,
        }
    }
}

/// Ledger row to append together with the status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub reviewer_id: Uuid,
    pub decision: PublicationStatus,
    pub justification: String,
}

/// The atomic unit of change produced by [`apply_transition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub decision: Decision,
    pub from: PublicationStatus,
    pub to: PublicationStatus,
    pub published_at: PublishedAt,
    pub ledger: Option<LedgerEntry>,
    pub at: DateTime<Utc>,
}

/// The parts of a publication the authority looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub author_id: Uuid,
    pub status: PublicationStatus,
}

impl From<&Publication> for Subject {
    fn from(publication: &Publication) -> Self {
        Self {
            author_id: publication.author_id,
            status: publication.status,
        }
    }
}

/// Status a brand-new publication starts in.
///
/// Administrators bypass review: submitting yields `approved` directly.
pub fn decide_initial_status(actor: &Actor, action: AuthorAction) -> PublicationStatus {
    match action {
        AuthorAction::Draft => PublicationStatus::Draft,
        AuthorAction::Submit if actor.is_admin() => PublicationStatus::Approved,
        AuthorAction::Submit => PublicationStatus::Pending,
    }
}

/// `published_at` effect of entering `status` through an author action
fn author_published_at(status: PublicationStatus, now: DateTime<Utc>) -> PublishedAt {
    if status == PublicationStatus::Approved {
        PublishedAt::Set(now)
    } else {
        PublishedAt::Clear
    }
}

/// `published_at` for a freshly created publication
pub fn initial_published_at(status: PublicationStatus, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    author_published_at(status, now).resolve(None)
}

/// Check that `actor` may change the fields of `subject`.
///
/// Ownership is required even for administrators; their powers over other
/// people's work are limited to review decisions.
pub fn authorize_author_edit(actor: &Actor, subject: Subject) -> Result<(), TransitionError> {
    if !actor.owns(subject.author_id) {
        return Err(TransitionError::NotAuthor);
    }
    if !subject.status.is_editable() {
        return Err(TransitionError::NotAllowed {
            from: subject.status,
            decision: Decision::SaveDraft,
        });
    }
    Ok(())
}

/// Decide whether `decision` may be applied by `actor` to `subject`, and
/// what it entails.
pub fn apply_transition(
    actor: &Actor,
    subject: Subject,
    decision: Decision,
    justification: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, TransitionError> {
    let justification = justification.map(str::trim).unwrap_or_default();
    if decision.requires_justification() && justification.is_empty() {
        return Err(TransitionError::MissingJustification);
    }

    let from = subject.status;
    let not_allowed = TransitionError::NotAllowed { from, decision };

    let (to, published_at) = match decision {
        Decision::SaveDraft | Decision::Submit => {
            if !actor.owns(subject.author_id) {
                return Err(TransitionError::NotAuthor);
            }
            if !from.is_editable() {
                return Err(not_allowed);
            }
            let action = if decision == Decision::Submit {
                AuthorAction::Submit
            } else {
                AuthorAction::Draft
            };
            let to = decide_initial_status(actor, action);
            (to, author_published_at(to, now))
        }
        Decision::Approve | Decision::Reject | Decision::Return => {
            if !actor.is_admin() {
                return Err(TransitionError::AdminRequired);
            }
            if !from.is_under_review() {
                return Err(not_allowed);
            }
            match decision {
                Decision::Approve => (PublicationStatus::Approved, PublishedAt::Set(now)),
                Decision::Reject => (PublicationStatus::Rejected, PublishedAt::Clear),
                _ => (PublicationStatus::Returned, PublishedAt::Clear),
            }
        }
        Decision::Retain => {
            if !actor.is_admin() {
                return Err(TransitionError::AdminRequired);
            }
            if from != PublicationStatus::Approved {
                return Err(not_allowed);
            }
            (PublicationStatus::Retained, PublishedAt::Keep)
        }
        Decision::Republish => {
            if !actor.is_admin() {
                return Err(TransitionError::AdminRequired);
            }
            if from != PublicationStatus::Retained {
                return Err(not_allowed);
            }
            (PublicationStatus::Approved, PublishedAt::Set(now))
        }
    };

    let ledger = decision.requires_justification().then(|| LedgerEntry {
        reviewer_id: actor.profile_id,
        decision: to,
        justification: justification.to_string(),
    });

    Ok(TransitionPlan {
        decision,
        from,
        to,
        published_at,
        ledger,
        at: now,
    })
}
