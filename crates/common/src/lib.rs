//! Scholarpress Common Library
//!
//! Shared code for the Scholarpress services including:
//! - Database models and repository
//! - Publication review workflow (transition authority, visibility, validation)
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Object storage client
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod review;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use auth::Actor;
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use review::PublicationService;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
