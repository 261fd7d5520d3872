// All handlers here sit behind the bearer auth middleware and receive the
// resolved caller as an `Extension<AuthUser>`.
pub mod applications;
pub mod documents;
pub mod users;

use crate::error::ApiError;
use crate::middleware::AuthUser;

/// Ownership check: the caller must be the record's `user_id`
pub(crate) fn ensure_owner(user: &AuthUser, owner_id: &str, denied: &str) -> Result<(), ApiError> {
    if user.owns(owner_id) {
        Ok(())
    } else {
        tracing::warn!("User {} denied access to record owned by {}", user.uid, owner_id);
        Err(ApiError::forbidden(denied))
    }
}
