use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileType {
    Student,
    Worker,
    Tourist,
    Business,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassportType {
    /// Ordinary (burgundy) passport
    Bordo,
    /// Special (green) passport
    Yesil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Stored profile row, keyed by the identity provider's uid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    pub name: String,
    pub surname: String,
    pub profile_type: ProfileType,
    pub passport_type: PassportType,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub passport_number: Option<String>,
    #[serde(default)]
    pub passport_expiry_date: Option<String>,
    #[serde(default)]
    pub passport_issue_date: Option<String>,
    /// Opaque client preferences, passed through unchanged
    #[serde(default)]
    pub preferences: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Profile as returned by `/users/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub profile_type: ProfileType,
    pub passport_type: PassportType,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub gender: Option<Gender>,
    pub passport_number: Option<String>,
    pub passport_expiry_date: Option<String>,
    pub passport_issue_date: Option<String>,
    pub preferences: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserResponse {
    /// Identity fields come from the verified token, the rest from storage
    pub fn from_profile(uid: &str, email: &str, profile: UserProfile) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.to_string(),
            name: profile.name,
            surname: profile.surname,
            profile_type: profile.profile_type,
            passport_type: profile.passport_type,
            phone: profile.phone,
            date_of_birth: profile.date_of_birth,
            nationality: profile.nationality,
            gender: profile.gender,
            passport_number: profile.passport_number,
            passport_expiry_date: profile.passport_expiry_date,
            passport_issue_date: profile.passport_issue_date,
            preferences: profile.preferences,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
            last_login_at: profile.last_login_at,
        }
    }
}

/// Partial profile update; only supplied fields are written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_type: Option<ProfileType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_type: Option<PassportType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_issue_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Map<String, Value>>,
}

const NAME_LEN: std::ops::RangeInclusive<usize> = 2..=100;

impl UserUpdate {
    /// Field-level validation; returns field → problem for every failure
    pub fn validate(&self) -> Result<(), HashMap<String, String>> {
        let mut errors = HashMap::new();
        for (field, value) in [("name", &self.name), ("surname", &self.surname)] {
            if let Some(v) = value {
                if !NAME_LEN.contains(&v.chars().count()) {
                    errors.insert(field.to_string(), "must be between 2 and 100 characters".to_string());
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Supplied fields as a merge patch
    pub fn into_fields(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
