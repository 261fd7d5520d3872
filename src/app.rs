use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::auth::{IdentityVerifier, JwtVerifier};
use crate::config::{AppConfig, BlobBackend, RecordBackend};
use crate::database::models::{Application, Document, UserProfile};
use crate::database::{MemoryRecordStore, PgRecordStore, RecordStore, Repository, Table};
use crate::handlers;
use crate::middleware::jwt_auth_middleware;
use crate::storage::{BlobStore, FsBlobStore, HttpBlobStore, MemoryBlobStore};

/// Headroom above the upload limit for multipart framing and metadata
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Explicitly constructed collaborators shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            records,
            blobs,
            identity,
        }
    }

    /// Build every adapter named by the configuration. Any failure is a
    /// startup error; there is no fallback to an inert client.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let records: Arc<dyn RecordStore> = match &config.storage.records {
            RecordBackend::Postgres { database_url, max_connections } => {
                Arc::new(PgRecordStore::connect(database_url, *max_connections).await?)
            }
            RecordBackend::Memory => {
                info!("Using in-memory record store; data will not survive a restart");
                Arc::new(MemoryRecordStore::new())
            }
        };

        let blobs: Arc<dyn BlobStore> = match &config.storage.blobs {
            BlobBackend::Filesystem { root } => {
                info!("Using filesystem blob store at {}", root.display());
                Arc::new(FsBlobStore::open(root.clone()).await?)
            }
            BlobBackend::Http { base_url, token } => {
                info!("Using HTTP blob store at {}", base_url);
                Arc::new(HttpBlobStore::new(base_url, token.clone())?)
            }
            BlobBackend::Memory => {
                info!("Using in-memory blob store; uploads will not survive a restart");
                Arc::new(MemoryBlobStore::new())
            }
        };

        let identity: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(&config.security.jwt_secret)?);

        Ok(Self::new(config, records, blobs, identity))
    }

    pub fn users(&self) -> Repository<UserProfile> {
        Repository::new(Table::Users, self.records.clone())
    }

    pub fn applications(&self) -> Repository<Application> {
        Repository::new(Table::Applications, self.records.clone())
    }

    pub fn documents(&self) -> Repository<Document> {
        Repository::new(Table::Documents, self.records.clone())
    }
}

pub fn app(state: AppState) -> Router {
    let body_limit = state.config.uploads.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let cors = cors_layer(&state.config);

    // Everything except the public probes requires a bearer token
    let protected = Router::new()
        .merge(application_routes())
        .merge(document_routes())
        .merge(user_routes())
        .route_layer(middleware::from_fn_with_state(state.identity.clone(), jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(protected)
        // Global middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn application_routes() -> Router<AppState> {
    use handlers::applications;

    Router::new()
        .route("/applications", post(applications::create).get(applications::list))
        .route("/applications/:app_id", get(applications::get).put(applications::update))
        .route("/applications/:app_id/steps/:step_id", put(applications::update_step))
}

fn document_routes() -> Router<AppState> {
    use handlers::documents;

    Router::new()
        .route("/documents", post(documents::upload).get(documents::list))
        .route("/documents/stats", get(documents::stats))
        .route(
            "/documents/:doc_id",
            get(documents::get).put(documents::update).delete(documents::delete),
        )
        .route("/documents/:doc_id/download", get(documents::download))
}

fn user_routes() -> Router<AppState> {
    use handlers::users;

    Router::new().route("/users/me", get(users::get_me).put(users::update_me))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let security = &config.security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "Visa API",
        "version": version,
        "endpoints": {
            "applications": "/applications[/:app_id[/steps/:step_id]] (protected)",
            "documents": "/documents[/stats | /:doc_id[/download]] (protected)",
            "users": "/users/me (protected)",
            "health": "/health (public)",
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.records.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
