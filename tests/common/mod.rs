#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

use visa_api::auth::{generate_jwt, Claims, JwtVerifier};
use visa_api::config::{AppConfig, BlobBackend, RecordBackend};
use visa_api::database::MemoryRecordStore;
use visa_api::storage::MemoryBlobStore;
use visa_api::{app, AppState};

pub const JWT_SECRET: &str = "integration-test-secret";

/// One in-process server per test, backed by memory stores
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub records: Arc<MemoryRecordStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::development();
        config.server.port = port;
        config.storage.records = RecordBackend::Memory;
        config.storage.blobs = BlobBackend::Memory;
        config.security.jwt_secret = JWT_SECRET.to_string();
        configure(&mut config);

        let records = Arc::new(MemoryRecordStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let identity = Arc::new(JwtVerifier::new(JWT_SECRET)?);
        let bind_addr = config.bind_address();
        let state = AppState::new(config, records.clone(), blobs.clone(), identity);

        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", bind_addr))?;
        let router = app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self { port, base_url, state, records, blobs };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, uid: &str) -> String {
        let claims = Claims::new(uid, format!("{}@example.com", uid), 1);
        generate_jwt(&claims, JWT_SECRET).expect("test token")
    }

    /// Client that sends `uid`'s bearer token on every request
    pub fn client_for(&self, uid: &str) -> reqwest::Client {
        let mut headers = reqwest::header::HeaderMap::new();
        let value = format!("Bearer {}", self.token(uid));
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&value).expect("ascii token"),
        );
        reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("client")
    }
}
