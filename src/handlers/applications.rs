// Visa application handlers: /applications[/:app_id[/steps/:step_id]]

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::app::AppState;
use crate::database::models::{Application, ApplicationCreate, ApplicationUpdate, StepUpdate};
use crate::database::Filter;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

use super::ensure_owner;

/// POST /applications - Create a DRAFT application owned by the caller
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ApplicationCreate>,
) -> ApiResult<Application> {
    let application = Application::new(&user.uid, payload);
    state.applications().insert(&application.app_id, &application).await?;

    info!("Created application {} for user {}", application.app_id, user.uid);
    Ok(ApiResponse::created(application))
}

/// GET /applications - All of the caller's applications, newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<Application>> {
    let filter = Filter::new().where_eq("user_id", user.uid.as_str());
    let mut applications = state.applications().select_any(&filter).await?;
    applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(ApiResponse::success(applications))
}

/// GET /applications/:app_id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(app_id): Path<String>,
) -> ApiResult<Application> {
    let application = load_owned(&state, &user, &app_id).await?;
    Ok(ApiResponse::success(application))
}

/// PUT /applications/:app_id - Overwrite the status, if one is supplied
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(app_id): Path<String>,
    Json(payload): Json<ApplicationUpdate>,
) -> ApiResult<Application> {
    let mut application = load_owned(&state, &user, &app_id).await?;
    let now = Utc::now();

    if let Some(status) = payload.status {
        if state.config.applications.enforce_status_transitions
            && !application.status.can_transition_to(status)
        {
            return Err(ApiError::bad_request(format!(
                "Cannot change application status from {} to {}",
                application.status.as_str(),
                status.as_str()
            )));
        }
        debug!("Application {} status {} -> {}", app_id, application.status.as_str(), status.as_str());
        application.set_status(status, now);
    }

    save(&state, application, now).await.map(ApiResponse::success)
}

/// PUT /applications/:app_id/steps/:step_id - Patch one embedded step
pub async fn update_step(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((app_id, step_id)): Path<(String, String)>,
    Json(payload): Json<StepUpdate>,
) -> ApiResult<Application> {
    let mut application = load_owned(&state, &user, &app_id).await?;

    if !application.update_step(&step_id, &payload) {
        return Err(ApiError::not_found(format!(
            "Step with id {} not found in application",
            step_id
        )));
    }

    save(&state, application, Utc::now()).await.map(ApiResponse::success)
}

/// Fetch → 404 → ownership check → 403
async fn load_owned(state: &AppState, user: &AuthUser, app_id: &str) -> Result<Application, ApiError> {
    let application = state
        .applications()
        .select_one(app_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;

    ensure_owner(user, &application.user_id, "Access denied: Application does not belong to current user")?;
    Ok(application)
}

/// Write the whole record back, guarded by the version read at load time
async fn save(state: &AppState, mut application: Application, now: chrono::DateTime<Utc>) -> Result<Application, ApiError> {
    let expected = json!(application.version);
    application.touch(now);

    let written = state
        .applications()
        .replace_if(&application.app_id, "version", expected, &application)
        .await?;
    if !written {
        return Err(ApiError::conflict(
            "Application was modified by another request; reload and retry",
        ));
    }
    Ok(application)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{ApplicationStatus, ApplicationStep};
    use crate::database::{RecordStore, Table};
    use crate::testing::TestContext;

    fn step(id: &str) -> ApplicationStep {
        ApplicationStep {
            step_id: id.to_string(),
            title: "Biometrics".to_string(),
            description: "Book a biometrics appointment".to_string(),
            priority_score: 3,
            requires_document: false,
            document_id: None,
            status: "pending".to_string(),
            source_urls: vec![],
        }
    }

    fn create_payload() -> ApplicationCreate {
        ApplicationCreate { application_name: "Work permit".into(), country_code: "NL".into() }
    }

    #[tokio::test]
    async fn create_starts_as_draft() {
        let ctx = TestContext::new();
        let created = create(State(ctx.state.clone()), Extension(ctx.user("u1")), Json(create_payload()))
            .await
            .unwrap();
        assert_eq!(created.status_code, Some(axum::http::StatusCode::CREATED));
        assert_eq!(created.data.status, ApplicationStatus::Draft);

        let stored = ctx.state.applications().select_one(&created.data.app_id).await.unwrap().unwrap();
        assert_eq!(stored, created.data);
    }

    #[tokio::test]
    async fn list_is_per_owner_and_newest_first() {
        let ctx = TestContext::new();
        let first = create(State(ctx.state.clone()), Extension(ctx.user("u1")), Json(create_payload()))
            .await
            .unwrap()
            .data;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = create(State(ctx.state.clone()), Extension(ctx.user("u1")), Json(create_payload()))
            .await
            .unwrap()
            .data;
        create(State(ctx.state.clone()), Extension(ctx.user("u2")), Json(create_payload()))
            .await
            .unwrap();

        let listed = list(State(ctx.state.clone()), Extension(ctx.user("u1"))).await.unwrap().data;
        let ids: Vec<_> = listed.iter().map(|a| a.app_id.clone()).collect();
        assert_eq!(ids, vec![second.app_id, first.app_id]);
    }

    #[tokio::test]
    async fn non_owner_is_forbidden_and_unknown_is_not_found() {
        let ctx = TestContext::new();
        let app = create(State(ctx.state.clone()), Extension(ctx.user("u1")), Json(create_payload()))
            .await
            .unwrap()
            .data;

        let err = update(
            State(ctx.state.clone()),
            Extension(ctx.user("intruder")),
            Path(app.app_id.clone()),
            Json(ApplicationUpdate { status: Some(ApplicationStatus::Approved) }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let err = get(State(ctx.state.clone()), Extension(ctx.user("u1")), Path("missing".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn any_status_may_follow_any_status_by_default() {
        let ctx = TestContext::new();
        let app = create(State(ctx.state.clone()), Extension(ctx.user("u1")), Json(create_payload()))
            .await
            .unwrap()
            .data;

        let updated = update(
            State(ctx.state.clone()),
            Extension(ctx.user("u1")),
            Path(app.app_id.clone()),
            Json(ApplicationUpdate { status: Some(ApplicationStatus::Approved) }),
        )
        .await
        .unwrap()
        .data;
        assert_eq!(updated.status, ApplicationStatus::Approved);
        assert!(updated.approved_at.is_some());
        assert!(updated.updated_at >= app.updated_at);
        assert_eq!(updated.version, app.version + 1);
    }

    #[tokio::test]
    async fn enforced_transitions_reject_skips() {
        let mut ctx = TestContext::new();
        ctx.configure(|c| c.applications.enforce_status_transitions = true);
        let app = create(State(ctx.state.clone()), Extension(ctx.user("u1")), Json(create_payload()))
            .await
            .unwrap()
            .data;

        let err = update(
            State(ctx.state.clone()),
            Extension(ctx.user("u1")),
            Path(app.app_id.clone()),
            Json(ApplicationUpdate { status: Some(ApplicationStatus::Approved) }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let stored = ctx.state.applications().select_one(&app.app_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Draft);
    }

    #[tokio::test]
    async fn step_update_rewrites_one_step() {
        let ctx = TestContext::new();
        let mut app = Application::new("u1", create_payload());
        app.application_steps = vec![step("s1")];
        ctx.state.applications().insert(&app.app_id, &app).await.unwrap();

        let updated = update_step(
            State(ctx.state.clone()),
            Extension(ctx.user("u1")),
            Path((app.app_id.clone(), "s1".into())),
            Json(StepUpdate { document_id: None, status: Some("done".into()) }),
        )
        .await
        .unwrap()
        .data;

        assert_eq!(updated.application_steps.len(), 1);
        let mut expected = step("s1");
        expected.status = "done".into();
        assert_eq!(updated.application_steps[0], expected);
    }

    #[tokio::test]
    async fn unknown_step_is_not_found_and_store_untouched() {
        let ctx = TestContext::new();
        let mut app = Application::new("u1", create_payload());
        app.application_steps = vec![step("s1")];
        ctx.state.applications().insert(&app.app_id, &app).await.unwrap();

        let err = update_step(
            State(ctx.state.clone()),
            Extension(ctx.user("u1")),
            Path((app.app_id.clone(), "s9".into())),
            Json(StepUpdate { document_id: Some("d1".into()), status: None }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let stored = ctx.state.applications().select_one(&app.app_id).await.unwrap().unwrap();
        assert_eq!(stored, app);
    }

    /// Row in the shape written before `version` existed
    async fn seed_unversioned(ctx: &TestContext) {
        let row = json!({
            "app_id": "a1",
            "user_id": "u1",
            "application_name": "Tourist visa",
            "country_code": "IT",
            "status": "DRAFT",
            "application_steps": [{
                "step_id": "s1",
                "title": "Passport",
                "description": "Upload passport",
                "priority_score": 1,
                "requires_document": true
            }],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });
        ctx.records.put(Table::Applications, "a1", row).await.unwrap();
    }

    #[tokio::test]
    async fn unversioned_rows_can_be_updated() {
        let ctx = TestContext::new();
        seed_unversioned(&ctx).await;

        let updated = update(
            State(ctx.state.clone()),
            Extension(ctx.user("u1")),
            Path("a1".into()),
            Json(ApplicationUpdate { status: Some(ApplicationStatus::Submitted) }),
        )
        .await
        .unwrap()
        .data;
        assert_eq!(updated.status, ApplicationStatus::Submitted);
        assert_eq!(updated.version, 1);

        let stored = ctx.records.get(Table::Applications, "a1").await.unwrap().unwrap();
        assert_eq!(stored["version"], 1);
        assert_eq!(stored["status"], "SUBMITTED");
    }

    #[tokio::test]
    async fn unversioned_rows_accept_step_updates() {
        let ctx = TestContext::new();
        seed_unversioned(&ctx).await;

        let updated = update_step(
            State(ctx.state.clone()),
            Extension(ctx.user("u1")),
            Path(("a1".into(), "s1".into())),
            Json(StepUpdate { document_id: Some("d1".into()), status: Some("done".into()) }),
        )
        .await
        .unwrap()
        .data;
        assert_eq!(updated.application_steps[0].document_id.as_deref(), Some("d1"));
        assert_eq!(updated.application_steps[0].status, "done");
        assert_eq!(updated.version, 1);
    }

    #[tokio::test]
    async fn stale_write_is_a_conflict() {
        let ctx = TestContext::new();
        let mut app = Application::new("u1", create_payload());
        app.application_steps = vec![step("s1")];
        ctx.state.applications().insert(&app.app_id, &app).await.unwrap();

        // Another writer got there first
        let mut racing = app.clone();
        racing.touch(Utc::now());
        ctx.state.applications().insert(&racing.app_id, &racing).await.unwrap();

        let err = save(&ctx.state, app, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
