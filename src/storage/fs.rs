use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::fs;
use tracing::debug;

use super::{validate_path, BlobError, BlobStore};

/// Blob store on the local filesystem, rooted at one directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create the root directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &bytes).await?;
        debug!("Stored blob {} ({} bytes, {})", path, bytes.len(), content_type);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes, BlobError> {
        let target = self.resolve(path)?;
        match fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::NotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        let target = self.resolve(path)?;
        Ok(fs::try_exists(&target).await?)
    }
}
