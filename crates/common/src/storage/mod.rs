//! Object storage for publication files
//!
//! Files are PDFs uploaded under `{author_id}/{publication_id}.pdf` and
//! served through public URLs resolved by the store.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Blob store collaborator
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing object when `upsert` is set
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str, upsert: bool) -> Result<()>;

    /// Public URL of the object stored under `key`
    fn public_url(&self, key: &str) -> String;
}

/// Key of the file attached to a publication
pub fn publication_file_key(author_id: Uuid, publication_id: Uuid) -> String {
    format!("{}/{}.pdf", author_id, publication_id)
}

/// Summary of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfInfo {
    pub pages: usize,
    pub bytes: usize,
}

/// Check that `bytes` is a readable PDF with at least one page and within
/// the size limit.
pub fn inspect_pdf(bytes: &[u8], max_bytes: usize) -> Result<PdfInfo> {
    if bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(AppError::InvalidFormat {
            message: "Uploaded file is not a PDF".to_string(),
        });
    }

    let doc = lopdf::Document::load_mem(bytes).map_err(|e| AppError::InvalidFormat {
        message: format!("Failed to parse PDF: {}", e),
    })?;

    let pages = doc.get_pages().len();
    if pages == 0 {
        return Err(AppError::InvalidFormat {
            message: "PDF has no pages".to_string(),
        });
    }

    debug!(pages, bytes = bytes.len(), "PDF accepted");
    Ok(PdfInfo {
        pages,
        bytes: bytes.len(),
    })
}

/// Client for a hosted object-storage REST API
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: Option<String>,
}

impl HttpBlobStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upload_timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create storage client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            service_key: config.service_key.clone(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/object/{}/{}", self.base_url, self.bucket, key)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str, upsert: bool) -> Result<()> {
        let size = bytes.len();
        let mut request = self
            .client
            .post(self.object_url(key))
            .header("Content-Type", content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes);

        if let Some(ref service_key) = self.service_key {
            request = request
                .header("Authorization", format!("Bearer {}", service_key))
                .header("apikey", service_key);
        }

        let response = request.send().await.map_err(|e| AppError::Storage {
            message: format!("Upload request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(key, %status, "Object upload rejected");
            return Err(AppError::Storage {
                message: format!("Upload failed with {}: {}", status, body),
            });
        }

        debug!(key, size, "Object uploaded");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, self.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_key() {
        let author = Uuid::nil();
        let publication = Uuid::from_u128(1);
        assert_eq!(
            publication_file_key(author, publication),
            format!("{}/{}.pdf", author, publication)
        );
    }

    #[test]
    fn test_urls() {
        let store = HttpBlobStore::new(&StorageConfig {
            base_url: "https://files.example.org/storage/v1/".to_string(),
            ..StorageConfig::default()
        })
        .unwrap();
        assert_eq!(
            store.object_url("a/b.pdf"),
            "https://files.example.org/storage/v1/object/publications/a/b.pdf"
        );
        assert_eq!(
            store.public_url("a/b.pdf"),
            "https://files.example.org/storage/v1/object/public/publications/a/b.pdf"
        );
    }

    #[test]
    fn test_inspect_rejects_non_pdf() {
        let err = inspect_pdf(b"hello world", 1024).unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat { .. }));
    }

    #[test]
    fn test_inspect_rejects_oversized() {
        let err = inspect_pdf(&[0u8; 64], 16).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { size: 64, limit: 16 }));
    }

    #[test]
    fn test_inspect_rejects_truncated_pdf() {
        let err = inspect_pdf(b"%PDF-1.7\n%broken", 1024).unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat { .. }));
    }
}
