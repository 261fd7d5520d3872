use std::sync::Arc;

use crate::app::AppState;
use crate::auth::{generate_jwt, Claims, JwtVerifier};
use crate::config::{AppConfig, BlobBackend, RecordBackend};
use crate::database::MemoryRecordStore;
use crate::middleware::AuthUser;
use crate::storage::MemoryBlobStore;

pub const TEST_JWT_SECRET: &str = "visa-api-test-secret";

/// Application state wired to in-memory backends.
/// The concrete stores stay reachable so tests can inspect what was written.
pub struct TestContext {
    pub state: AppState,
    pub records: Arc<MemoryRecordStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestContext {
    pub fn new() -> Self {
        let mut config = AppConfig::development();
        config.storage.records = RecordBackend::Memory;
        config.storage.blobs = BlobBackend::Memory;
        config.security.jwt_secret = TEST_JWT_SECRET.to_string();

        let records = Arc::new(MemoryRecordStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let identity = Arc::new(JwtVerifier::new(TEST_JWT_SECRET).expect("test secret is not empty"));
        let state = AppState::new(config, records.clone(), blobs.clone(), identity);

        Self { state, records, blobs }
    }

    /// Adjust the configuration seen by handlers; stored data is kept
    pub fn configure(&mut self, f: impl FnOnce(&mut AppConfig)) {
        let mut config = (*self.state.config).clone();
        f(&mut config);
        self.state.config = Arc::new(config);
    }

    pub fn user(&self, uid: &str) -> AuthUser {
        AuthUser {
            uid: uid.to_string(),
            email: format!("{}@example.com", uid),
        }
    }

    pub fn token(&self, uid: &str) -> String {
        let claims = Claims::new(uid, format!("{}@example.com", uid), 1);
        generate_jwt(&claims, TEST_JWT_SECRET).expect("test token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokens_resolve_to_the_same_user() {
        let ctx = TestContext::new();
        let resolved = ctx.state.identity.resolve(&ctx.token("u1")).await.unwrap();
        assert_eq!(resolved, ctx.user("u1"));
    }

    #[tokio::test]
    async fn configure_keeps_the_stores() {
        let mut ctx = TestContext::new();
        ctx.configure(|c| c.uploads.max_upload_bytes = 1);
        assert_eq!(ctx.state.config.uploads.max_upload_bytes, 1);

        ctx.state
            .blobs
            .put("users/u1/documents/d1.txt", axum::body::Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        assert_eq!(ctx.blobs.len().await, 1);
    }
}
