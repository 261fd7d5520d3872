use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "DRAFT",
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::UnderReview => "UNDER_REVIEW",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    /// Allowed-transition table, consulted only when transition
    /// enforcement is switched on. Re-applying the current status is allowed.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        self == next
            || matches!(
                (self, next),
                (Draft, Submitted) | (Submitted, UnderReview) | (UnderReview, Approved) | (UnderReview, Rejected)
            )
    }
}

fn default_step_status() -> String {
    "pending".to_string()
}

/// Embedded checklist entry of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStep {
    pub step_id: String,
    pub title: String,
    pub description: String,
    pub priority_score: i64,
    pub requires_document: bool,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default = "default_step_status")]
    pub status: String,
    #[serde(default)]
    pub source_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub app_id: String,
    pub user_id: String,
    pub application_name: String,
    pub country_code: String,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub application_steps: Vec<ApplicationStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    /// Bumped on every write; guards whole-record overwrites
    #[serde(default)]
    pub version: u64,
}

impl Application {
    pub fn new(user_id: &str, create: ApplicationCreate) -> Self {
        let now = Utc::now();
        Self {
            app_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            application_name: create.application_name,
            country_code: create.country_code,
            status: ApplicationStatus::Draft,
            application_steps: Vec::new(),
            created_at: now,
            updated_at: now,
            submitted_at: None,
            approved_at: None,
            version: 0,
        }
    }

    pub fn set_status(&mut self, status: ApplicationStatus, now: DateTime<Utc>) {
        self.status = status;
        match status {
            ApplicationStatus::Submitted => self.submitted_at = Some(now),
            ApplicationStatus::Approved => self.approved_at = Some(now),
            _ => {}
        }
    }

    /// Apply `update` to the first step with `step_id`.
    /// Returns false, leaving the list untouched, when no step matches.
    pub fn update_step(&mut self, step_id: &str, update: &StepUpdate) -> bool {
        let Some(step) = self.application_steps.iter_mut().find(|s| s.step_id == step_id) else {
            return false;
        };
        if let Some(document_id) = &update.document_id {
            step.document_id = Some(document_id.clone());
        }
        if let Some(status) = &update.status {
            step.status = status.clone();
        }
        true
    }

    /// Stamp a write: bump `updated_at` and the version token
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationCreate {
    pub application_name: String,
    pub country_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationUpdate {
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepUpdate {
    pub document_id: Option<String>,
    pub status: Option<String>,
}
