use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Largest upload accepted by `POST /documents` unless overridden.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub uploads: UploadConfig,
    pub applications: ApplicationConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordBackend {
    Postgres { database_url: String, max_connections: u32 },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobBackend {
    Filesystem { root: PathBuf },
    Http { base_url: String, token: Option<String> },
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub records: RecordBackend,
    pub blobs: BlobBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// When set, status updates must follow the allowed-transition table.
    pub enforce_status_transitions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("VISA_API_PORT").or_else(|_| env::var("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("BIND_ADDR") {
            self.server.bind_addr = v;
        }

        // Record store overrides
        match env::var("RECORD_STORE").as_deref() {
            Ok("memory") => self.storage.records = RecordBackend::Memory,
            Ok("postgres") => {
                if !matches!(self.storage.records, RecordBackend::Postgres { .. }) {
                    self.storage.records = RecordBackend::Postgres {
                        database_url: String::new(),
                        max_connections: 10,
                    };
                }
            }
            _ => {}
        }
        if let RecordBackend::Postgres { database_url, max_connections } = &mut self.storage.records {
            if let Ok(v) = env::var("DATABASE_URL") {
                *database_url = v;
            }
            if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
                *max_connections = v.parse().unwrap_or(*max_connections);
            }
        }

        // Blob store overrides
        match env::var("BLOB_STORE").as_deref() {
            Ok("memory") => self.storage.blobs = BlobBackend::Memory,
            Ok("fs") => {
                self.storage.blobs = BlobBackend::Filesystem {
                    root: env::var("BLOB_ROOT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./blobs")),
                }
            }
            Ok("http") => {
                self.storage.blobs = BlobBackend::Http {
                    base_url: env::var("BLOB_BASE_URL").unwrap_or_default(),
                    token: env::var("BLOB_TOKEN").ok(),
                }
            }
            _ => {
                if let (BlobBackend::Filesystem { root }, Ok(v)) = (&mut self.storage.blobs, env::var("BLOB_ROOT")) {
                    *root = PathBuf::from(v);
                }
            }
        }

        // Upload overrides
        if let Ok(v) = env::var("UPLOAD_MAX_BYTES") {
            self.uploads.max_upload_bytes = v.parse().unwrap_or(self.uploads.max_upload_bytes);
        }

        // Application overrides
        if let Ok(v) = env::var("APPLICATIONS_ENFORCE_STATUS_TRANSITIONS") {
            self.applications.enforce_status_transitions =
                v.parse().unwrap_or(self.applications.enforce_status_transitions);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                bind_addr: "127.0.0.1".to_string(),
                port: 8000,
            },
            storage: StorageConfig {
                records: RecordBackend::Memory,
                blobs: BlobBackend::Filesystem { root: PathBuf::from("./blobs") },
            },
            uploads: UploadConfig {
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            applications: ApplicationConfig {
                enforce_status_transitions: false,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                bind_addr: "0.0.0.0".to_string(),
                port: 8000,
            },
            storage: StorageConfig {
                records: RecordBackend::Postgres {
                    database_url: String::new(),
                    max_connections: 20,
                },
                blobs: BlobBackend::Filesystem { root: PathBuf::from("/var/lib/visa-api/blobs") },
            },
            uploads: UploadConfig {
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            applications: ApplicationConfig {
                enforce_status_transitions: false,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                bind_addr: "0.0.0.0".to_string(),
                port: 8000,
            },
            storage: StorageConfig {
                records: RecordBackend::Postgres {
                    database_url: String::new(),
                    max_connections: 50,
                },
                blobs: BlobBackend::Filesystem { root: PathBuf::from("/var/lib/visa-api/blobs") },
            },
            uploads: UploadConfig {
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            applications: ApplicationConfig {
                enforce_status_transitions: false,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
            },
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind_addr, self.server.port)
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.storage.records, RecordBackend::Memory);
        assert_eq!(config.uploads.max_upload_bytes, 10_485_760);
        assert!(!config.applications.enforce_status_transitions);
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(matches!(config.storage.records, RecordBackend::Postgres { max_connections: 50, .. }));
        // Production must be given a secret explicitly
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.security.jwt_expiry_hours, 4);
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::development();
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
    }
}
