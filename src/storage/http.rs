use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use url::Url;

use super::{validate_path, BlobError, BlobStore};

/// Blob store behind an object-storage REST endpoint.
///
/// Objects are addressed as `{base_url}/{path}`: `PUT` uploads with the given
/// content type, `GET` downloads, `DELETE` removes and `HEAD` probes. A bearer
/// token, if configured, is sent on every request.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBlobStore {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, BlobError> {
        let mut base_url = Url::parse(base_url).map_err(|e| BlobError::Config(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BlobError::Config(format!("{} cannot be used as a base URL", base_url)));
        }
        // Url::join replaces the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            token,
        })
    }

    pub fn object_url(&self, path: &str) -> Result<Url, BlobError> {
        validate_path(path)?;
        self.base_url
            .join(path)
            .map_err(|e| BlobError::InvalidPath(format!("{}: {}", path, e)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn unexpected(status: StatusCode, path: &str) -> BlobError {
    BlobError::UnexpectedStatus {
        status: status.as_u16(),
        path: path.to_string(),
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError> {
        let url = self.object_url(path)?;
        let response = self
            .authorize(self.client.put(url))
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected(response.status(), path))
        }
    }

    async fn get(&self, path: &str) -> Result<Bytes, BlobError> {
        let url = self.object_url(path)?;
        let response = self.authorize(self.client.get(url)).send().await?;
        match response.status() {
            s if s.is_success() => Ok(response.bytes().await?),
            StatusCode::NOT_FOUND => Err(BlobError::NotFound(path.to_string())),
            s => Err(unexpected(s, path)),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let url = self.object_url(path)?;
        let response = self.authorize(self.client.delete(url)).send().await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            s => Err(unexpected(s, path)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        let url = self.object_url(path)?;
        let response = self.authorize(self.client.head(url)).send().await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(unexpected(s, path)),
        }
    }
}
