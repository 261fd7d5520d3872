use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::sync::RwLock;

use super::{validate_path, BlobError, BlobStore};

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Bytes,
    content_type: String,
}

/// In-process blob store used for development and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, StoredBlob>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn content_type(&self, path: &str) -> Option<String> {
        self.blobs.read().await.get(path).map(|b| b.content_type.clone())
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError> {
        validate_path(path)?;
        let blob = StoredBlob {
            bytes,
            content_type: content_type.to_string(),
        };
        self.blobs.write().await.insert(path.to_string(), blob);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes, BlobError> {
        self.blobs
            .read()
            .await
            .get(path)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.blobs.write().await.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        Ok(self.blobs.read().await.contains_key(path))
    }
}
