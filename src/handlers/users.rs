use axum::{extract::State, Extension, Json};
use tracing::info;

use crate::app::AppState;
use crate::database::models::{UserResponse, UserUpdate};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /users/me
pub async fn get_me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<UserResponse> {
    let profile = state
        .users()
        .select_one(&user.uid)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::success(UserResponse::from_profile(&user.uid, &user.email, profile)))
}

/// PUT /users/me - merge the supplied fields into an existing profile
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UserUpdate>,
) -> ApiResult<UserResponse> {
    if let Err(field_errors) = payload.validate() {
        return Err(ApiError::validation_error("Invalid profile update", Some(field_errors)));
    }

    let profile = state
        .users()
        .patch(&user.uid, payload.into_fields())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!("Updated profile for user {}", user.uid);
    Ok(ApiResponse::success(UserResponse::from_profile(&user.uid, &user.email, profile)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{PassportType, ProfileType, UserProfile};
    use crate::testing::TestContext;
    use chrono::{Duration, Utc};
    use serde_json::{json, Map};

    fn profile(uid: &str) -> UserProfile {
        let created = Utc::now() - Duration::days(3);
        let mut preferences = Map::new();
        preferences.insert("language".into(), json!("tr"));
        UserProfile {
            uid: uid.to_string(),
            email: Some("stale@example.com".into()),
            name: "Ayşe".into(),
            surname: "Yılmaz".into(),
            profile_type: ProfileType::Tourist,
            passport_type: PassportType::Bordo,
            phone: None,
            date_of_birth: None,
            nationality: Some("TR".into()),
            gender: None,
            passport_number: None,
            passport_expiry_date: None,
            passport_issue_date: None,
            preferences: Some(preferences),
            created_at: created,
            updated_at: created,
            last_login_at: None,
        }
    }

    #[tokio::test]
    async fn identity_comes_from_the_token() {
        let ctx = TestContext::new();
        ctx.state.users().insert("u1", &profile("u1")).await.unwrap();

        let me = get_me(State(ctx.state.clone()), Extension(ctx.user("u1"))).await.unwrap().data;
        assert_eq!(me.uid, "u1");
        assert_eq!(me.email, "u1@example.com");
        assert_eq!(me.name, "Ayşe");
        assert_eq!(me.preferences.unwrap()["language"], "tr");
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let ctx = TestContext::new();
        let err = get_me(State(ctx.state.clone()), Extension(ctx.user("ghost"))).await.unwrap_err();
        assert_eq!(err.message(), "User not found");

        let err = update_me(
            State(ctx.state.clone()),
            Extension(ctx.user("ghost")),
            Json(UserUpdate { name: Some("Ghost".into()), ..Default::default() }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_merges_supplied_fields() {
        let ctx = TestContext::new();
        let original = profile("u1");
        ctx.state.users().insert("u1", &original).await.unwrap();

        let update = UserUpdate {
            surname: Some("Demir".into()),
            passport_type: Some(PassportType::Yesil),
            ..Default::default()
        };
        let me = update_me(State(ctx.state.clone()), Extension(ctx.user("u1")), Json(update))
            .await
            .unwrap()
            .data;

        assert_eq!(me.name, "Ayşe");
        assert_eq!(me.surname, "Demir");
        assert_eq!(me.passport_type, PassportType::Yesil);
        assert_eq!(me.nationality.as_deref(), Some("TR"));
        assert_eq!(me.created_at, original.created_at);
        assert!(me.updated_at > original.updated_at);
    }

    #[tokio::test]
    async fn invalid_update_writes_nothing() {
        let ctx = TestContext::new();
        let original = profile("u1");
        ctx.state.users().insert("u1", &original).await.unwrap();

        let err = update_me(
            State(ctx.state.clone()),
            Extension(ctx.user("u1")),
            Json(UserUpdate { name: Some("A".into()), ..Default::default() }),
        )
        .await
        .unwrap_err();

        match err {
            ApiError::ValidationError { field_errors: Some(fields), .. } => assert!(fields.contains_key("name")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(ctx.state.users().select_one("u1").await.unwrap(), Some(original));
    }
}
