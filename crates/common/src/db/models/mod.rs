//! SeaORM entity models
//!
//! Database entities for Scholarpress

mod profile;
mod publication;
mod publication_author;
mod publication_review;
mod site_config;

pub use profile::{
    Entity as ProfileEntity,
    Model as Profile,
    ActiveModel as ProfileActiveModel,
    Column as ProfileColumn,
    UserType,
};

pub use publication::{
    Entity as PublicationEntity,
    Model as Publication,
    ActiveModel as PublicationActiveModel,
    Column as PublicationColumn,
    PublicationStatus,
};

pub use publication_author::{
    Entity as PublicationAuthorEntity,
    Model as PublicationAuthor,
    ActiveModel as PublicationAuthorActiveModel,
    Column as PublicationAuthorColumn,
};

pub use publication_review::{
    Entity as PublicationReviewEntity,
    Model as PublicationReview,
    ActiveModel as PublicationReviewActiveModel,
    Column as PublicationReviewColumn,
};

pub use site_config::{
    Entity as SiteConfigEntity,
    Model as SiteConfig,
    ActiveModel as SiteConfigActiveModel,
};
