//! Review ledger entity
//!
//! Append-only: rows are inserted once per administrator decision and
//! never updated or deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::publication::PublicationStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "publication_reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub publication_id: Uuid,

    pub reviewer_id: Uuid,

    pub decision: PublicationStatus,

    #[sea_orm(column_type = "Text")]
    pub justification: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::publication::Entity",
        from = "Column::PublicationId",
        to = "super::publication::Column::Id"
    )]
    Publication,

    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::ReviewerId",
        to = "super::profile::Column::Id"
    )]
    Reviewer,
}

impl Related<super::publication::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Publication.def()
    }
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviewer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
