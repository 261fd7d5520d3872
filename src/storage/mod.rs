pub mod fs;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;

pub use fs::FsBlobStore;
pub use http::HttpBlobStore;
pub use memory::MemoryBlobStore;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("Blob store configuration error: {0}")]
    Config(String),

    #[error("Blob store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blob store returned {status} for {path}")]
    UnexpectedStatus { status: u16, path: String },
}

/// Thin facade over object storage, keyed by slash separated paths.
/// Callers choose the path; the store does not enforce any namespacing.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError>;

    /// Fails with [`BlobError::NotFound`] when nothing is stored at `path`
    async fn get(&self, path: &str) -> Result<Bytes, BlobError>;

    /// No-op when nothing is stored at `path`
    async fn delete(&self, path: &str) -> Result<(), BlobError>;

    async fn exists(&self, path: &str) -> Result<bool, BlobError>;
}

/// Reject empty, absolute and parent-relative paths
pub fn validate_path(path: &str) -> Result<(), BlobError> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(BlobError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}
