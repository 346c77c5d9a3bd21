//! Publication entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a publication
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "publication_status")]
pub enum PublicationStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "retained")]
    Retained,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "draft",
            PublicationStatus::Pending => "pending",
            PublicationStatus::Approved => "approved",
            PublicationStatus::Rejected => "rejected",
            PublicationStatus::Returned => "returned",
            PublicationStatus::Retained => "retained",
        }
    }

    /// States in which the author may still change the publication
    pub fn is_editable(&self) -> bool {
        matches!(self, PublicationStatus::Draft | PublicationStatus::Returned)
    }

    /// States awaiting an administrator decision
    pub fn is_under_review(&self) -> bool {
        matches!(self, PublicationStatus::Pending | PublicationStatus::Returned)
    }

    /// Statuses whose latest review is shown back to the author
    pub fn carries_feedback(&self) -> bool {
        matches!(
            self,
            PublicationStatus::Returned | PublicationStatus::Rejected | PublicationStatus::Retained
        )
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "publications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning profile
    pub author_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub summary: String,

    /// Rich text body; empty when the publication is carried by a file
    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub keywords: Option<String>,

    /// Public URL of the attached PDF
    #[sea_orm(column_type = "Text", nullable)]
    pub file_path: Option<String>,

    pub status: PublicationStatus,

    pub published_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::AuthorId",
        to = "super::profile::Column::Id"
    )]
    Author,

    #[sea_orm(has_many = "super::publication_author::Entity")]
    SecondaryAuthors,

    #[sea_orm(has_many = "super::publication_review::Entity")]
    Reviews,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::publication_author::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SecondaryAuthors.def()
    }
}

impl Related<super::publication_review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
