use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::{AuthError, Claims, IdentityVerifier};
use crate::error::ApiError;

/// Authenticated caller resolved from the bearer token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}

impl AuthUser {
    /// Ownership check against a record's `user_id`
    pub fn owns(&self, user_id: &str) -> bool {
        self.uid == user_id
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
        }
    }
}

/// Bearer authentication middleware: resolves the caller through the
/// injected verifier and inserts an [`AuthUser`] extension. Requests without
/// a valid credential stop here with 401, before any storage access.
pub async fn jwt_auth_middleware(
    State(verifier): State<Arc<dyn IdentityVerifier>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers)?;

    let auth_user = verifier.resolve(token).await.map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;

    let auth_str = auth_header.to_str().map_err(|_| AuthError::MalformedHeader)?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err(AuthError::InvalidToken("empty token".to_string())),
        None => Err(AuthError::MalformedHeader),
    }
}
